mod error;
mod extract;
mod image_utils;
mod interaction;
mod mask;
mod region_grow;
mod sequence;
mod settings;
mod stroke;

pub use error::*;
pub use extract::*;
pub use image_utils::*;
pub use interaction::*;
pub use mask::*;
pub use region_grow::*;
pub use sequence::*;
pub use settings::*;
pub use stroke::*;
