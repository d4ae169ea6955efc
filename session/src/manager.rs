//! 站点登记处与会话事件循环
//!
//! SiteManager 是进程里唯一的站点登记处，在会话启动时显式构造，
//! 不做惰性全局单例。所有站点的拆除最终都汇到它的
//! `handle_event` 里完成移除，重入的拆除调用在 Site 一层已经
//! 被吸收成空操作。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use protocol::{PlayerKind, ServerAddress};

use crate::backend::{backend_for, Backend};
use crate::error::Result;
use crate::event::{SessionEvent, SiteId};
use crate::player::Player;
use crate::site::{Site, SiteType, TableEnvironment};

pub struct SiteManager {
    sites: HashMap<SiteId, Site>,
    next_id: SiteId,
    events_tx: UnboundedSender<SessionEvent>,
}

impl SiteManager {
    pub fn new(events_tx: UnboundedSender<SessionEvent>) -> Self {
        Self {
            sites: HashMap::new(),
            next_id: 1,
            events_tx,
        }
    }

    /// 创建一个站点：后端策略、本地玩家、连接工作者、响应转投任务
    ///
    /// 工作者把响应回投到站点专属通道；这里起一个转投任务给响应
    /// 打上站点号，汇入统一的会话事件流。
    pub fn create_site(
        &mut self,
        stype: SiteType,
        address: ServerAddress,
        player_id: &str,
        password: Option<String>,
        env: Box<dyn TableEnvironment>,
    ) -> SiteId {
        self.create_site_with_backend(stype, address, player_id, password, env, backend_for(stype))
    }

    pub(crate) fn create_site_with_backend(
        &mut self,
        stype: SiteType,
        address: ServerAddress,
        player_id: &str,
        password: Option<String>,
        env: Box<dyn TableEnvironment>,
        backend: Arc<dyn Backend>,
    ) -> SiteId {
        let site_id = self.next_id;
        self.next_id += 1;

        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            while let Some(response) = reply_rx.recv().await {
                if events_tx
                    .send(SessionEvent::Response { site_id, response })
                    .is_err()
                {
                    break;
                }
            }
        });

        // 本站点自己的玩家按后端类型标记，桌子据此识别棋盘玩家
        let kind = match stype {
            SiteType::Local => PlayerKind::Local,
            SiteType::Remote => PlayerKind::Remote,
            SiteType::AlternateRemote => PlayerKind::AlternateRemote,
        };
        let mut player = Player::new(player_id, kind, password, backend, reply_tx);
        if stype != SiteType::Local {
            player.start_connection(address.clone());
        }

        let site = Site::new(
            site_id,
            stype,
            address,
            player,
            self.events_tx.clone(),
            env,
        );
        info!(site = site_id, stype = ?stype, "Site created");
        self.sites.insert(site_id, site);
        site_id
    }

    /// 本地练习站点（不出网）
    pub fn create_local_site(
        &mut self,
        player_id: &str,
        env: Box<dyn TableEnvironment>,
    ) -> SiteId {
        self.create_site(
            SiteType::Local,
            ServerAddress::new("local", 0),
            player_id,
            None,
            env,
        )
    }

    pub fn site(&self, site_id: SiteId) -> Option<&Site> {
        self.sites.get(&site_id)
    }

    pub fn site_mut(&mut self, site_id: SiteId) -> Option<&mut Site> {
        self.sites.get_mut(&site_id)
    }

    pub fn find_site_by_address(&self, address: &ServerAddress) -> Option<SiteId> {
        self.sites
            .values()
            .find(|s| s.address() == address)
            .map(Site::id)
    }

    pub fn local_site(&self) -> Option<SiteId> {
        self.sites
            .values()
            .find(|s| s.site_type() == SiteType::Local)
            .map(Site::id)
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn delete_site(&mut self, site_id: SiteId) {
        if self.sites.remove(&site_id).is_some() {
            info!(site = site_id, "Site removed");
        } else {
            debug!(site = site_id, "Remove for an unknown site");
        }
    }

    /// 请所有站点登出；真正的移除等各自的 SiteCloseReady 到达
    pub fn close(&mut self) {
        for site in self.sites.values_mut() {
            site.disconnect();
        }
    }

    /// 统一的事件入口
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Response { site_id, response } => {
                match self.sites.get_mut(&site_id) {
                    Some(site) => site.on_response(response),
                    // 站点先于在途响应被移除，安全忽略
                    None => debug!(site = site_id, "Response for a removed site"),
                }
            }
            SessionEvent::SiteCloseReady { site_id } => self.delete_site(site_id),
        }
    }
}

/// 会话：登记处加上驱动它的事件循环
///
/// 所有 Site/Table/Player 状态只在这里的调用栈上变更；
/// 工作者任务只通过通道投递不可变事件。
pub struct Session {
    manager: SiteManager,
    events_rx: UnboundedReceiver<SessionEvent>,
}

impl Session {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            manager: SiteManager::new(events_tx),
            events_rx,
        }
    }

    pub fn manager(&self) -> &SiteManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut SiteManager {
        &mut self.manager
    }

    /// 等待并处理下一个事件；通道关闭时返回 false
    pub async fn tick(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.manager.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// 非阻塞地清空积压事件，返回处理条数
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.manager.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// 优雅收尾：请所有站点登出，处理事件直到登记处清空
    pub async fn shutdown(&mut self) -> Result<()> {
        self.manager.close();
        while !self.manager.is_empty() {
            if !self.tick().await {
                break;
            }
        }
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::site::testutil::TestEnv;
    use protocol::{RequestType, TimeInfo};

    fn remote_site(session: &mut Session) -> SiteId {
        let (env, _board) = TestEnv::new();
        session.manager_mut().create_site_with_backend(
            SiteType::Remote,
            ServerAddress::new("mock", 0),
            "alice",
            None,
            Box::new(env),
            MockBackend::echo(),
        )
    }

    #[tokio::test]
    async fn test_response_events_reach_the_owning_site() {
        let mut session = Session::new();
        let site_id = remote_site(&mut session);

        session
            .manager_mut()
            .site_mut(site_id)
            .unwrap()
            .connect()
            .unwrap();

        // 响应经转投任务汇入会话事件流
        assert!(session.tick().await);
        assert!(session.manager().site(site_id).unwrap().player().is_some());
    }

    #[tokio::test]
    async fn test_site_player_kind_follows_site_type() {
        let mut session = Session::new();
        let remote_id = remote_site(&mut session);
        let kind = |session: &Session, id| {
            session
                .manager()
                .site(id)
                .and_then(|s| s.player())
                .map(Player::kind)
        };
        assert_eq!(kind(&session, remote_id), Some(PlayerKind::Remote));

        let (env, _board) = TestEnv::new();
        let local_id = session
            .manager_mut()
            .create_local_site("alice", Box::new(env));
        assert_eq!(kind(&session, local_id), Some(PlayerKind::Local));
    }

    #[tokio::test]
    async fn test_find_site_by_address() {
        let mut session = Session::new();
        let site_id = remote_site(&mut session);

        let found = session
            .manager()
            .find_site_by_address(&ServerAddress::new("mock", 0));
        assert_eq!(found, Some(site_id));
        assert!(session
            .manager()
            .find_site_by_address(&ServerAddress::new("elsewhere", 1))
            .is_none());
    }

    #[tokio::test]
    async fn test_shutdown_empties_the_registry() {
        let mut session = Session::new();
        let site_id = remote_site(&mut session);

        session
            .manager_mut()
            .site_mut(site_id)
            .unwrap()
            .connect()
            .unwrap();
        assert!(session.tick().await);

        session.shutdown().await.unwrap();
        assert!(session.manager().is_empty());
    }

    #[tokio::test]
    async fn test_local_site_practice_lifecycle() {
        let mut session = Session::new();
        let (env, _board) = TestEnv::new();
        let site_id = session.manager_mut().create_local_site("alice", Box::new(env));
        assert_eq!(session.manager().local_site(), Some(site_id));

        let tid = session
            .manager_mut()
            .site_mut(site_id)
            .unwrap()
            .open_practice_table()
            .unwrap();
        assert!(session.manager().site(site_id).unwrap().table(&tid).is_some());

        session.shutdown().await.unwrap();
        assert!(session.manager().is_empty());
    }

    #[tokio::test]
    async fn test_late_response_after_site_removal_is_ignored() {
        let mut session = Session::new();
        let site_id = remote_site(&mut session);
        session.manager_mut().delete_site(site_id);

        session.manager_mut().handle_event(SessionEvent::Response {
            site_id,
            response: protocol::Response::ok(RequestType::List, ""),
        });
        assert!(session.manager().is_empty());
    }

    #[tokio::test]
    async fn test_new_table_request_flows_through_session() {
        let mut session = Session::new();
        let site_id = remote_site(&mut session);

        let site = session.manager_mut().site_mut(site_id).unwrap();
        site.connect().unwrap();
        assert!(session.tick().await);

        let site = session.manager_mut().site_mut(site_id).unwrap();
        site.on_local_request_new(TimeInfo::new(1500, 300, 20))
            .unwrap();
        // NEW 的回声被当作桌子记录解析失败只会告警，这里只验证送达
        assert!(session.tick().await);
    }
}
