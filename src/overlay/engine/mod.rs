mod geom;
mod layout;
mod search;
mod wrap;

pub use geom::reduce_quad;
pub use layout::{DrawInstruction, LayoutPlan, compose_layout};
pub use search::{FitKind, SizeRange, SizeSearchResult, find_font_size};
pub use wrap::{WrapResult, wrap_relaxed, wrap_words};
