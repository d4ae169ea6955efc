//! 协调上下文的事件类型
//!
//! 工作者线程与站点拆除路径都只通过这些事件和协调上下文通信。

use protocol::Response;

/// 站点 ID
pub type SiteId = u32;

/// 投递给协调上下文的事件
#[derive(Debug)]
pub enum SessionEvent {
    /// 某站点的连接工作者回投了一条响应
    Response { site_id: SiteId, response: Response },
    /// 某站点已完成两阶段拆除，可以被登记处移除
    SiteCloseReady { site_id: SiteId },
}
