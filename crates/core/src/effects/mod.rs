//! Effect types that ship with the runtime.

mod screen;
mod shake;

pub use screen::{ScreenDesc, ScreenEffect, ScreenEffectType, ScreenMode};
pub use shake::{ShakeDesc, ShakeEffect, ShakeEffectType, ShakeKind, ShakeShared};
