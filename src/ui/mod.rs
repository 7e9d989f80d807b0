//! UI 模块
//!
//! 采用 MVI (Model-View-Intent) 架构：
//! - Model (state.rs): App 结构体，共享状态保存在 Store 中
//! - View (view/): 纯函数，将 State 映射为 UI
//! - Intent (actions.rs): 用户交互转化为明确的语义化 Action
//!
//! Store 的订阅只负责标记重绘，主循环据此决定是否重新绘制。

pub mod actions;
pub mod input;
pub mod logic;
pub mod state;
pub mod view;

pub use input::handle_key_event;
pub use state::App;
pub use view::render;
