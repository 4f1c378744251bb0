pub mod candidate_list;
pub mod diff;
pub mod error;
pub mod input;
pub mod layer;
pub mod renderer;
pub mod terminal;
pub mod width;

pub use diff::{DiffEngine, DirectoryDiffViewer};
pub use error::DiffError;
pub use layer::{UILayer, UILayerStack};
pub use renderer::Renderer;
