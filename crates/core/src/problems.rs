mod forward;
mod implicit;

pub use forward::ForwardOde;
pub use implicit::{ImplicitOde, MultiVector};
