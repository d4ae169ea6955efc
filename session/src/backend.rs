//! 后端方言策略
//!
//! Player 在链路边界之上保持后端无关；每种后端只需要提供两个钩子：
//! 把统一的 Request 格式化成自己的请求内容串，以及构造匹配的链路。
//! 站点创建时按站点类型从工厂选取策略值（组合，不做继承链）。

use std::sync::Arc;

use protocol::{Request, ResultCode};

use crate::site::SiteType;
use crate::wire::{StxWire, TcpWire, Wire};

/// 后端策略
pub trait Backend: Send + Sync {
    /// 构造匹配的链路
    fn make_wire(&self) -> Box<dyn Wire>;

    /// 把请求格式化成该后端的内容串
    fn build_content(&self, req: &Request) -> String;

    /// 把原始响应拆成结果码和负载
    fn parse_reply(&self, raw: &str) -> (ResultCode, String);
}

/// 按站点类型选取后端策略
pub fn backend_for(stype: SiteType) -> Arc<dyn Backend> {
    match stype {
        // 本地站点不出网，给个通用策略占位即可
        SiteType::Local | SiteType::Remote => Arc::new(GenericBackend),
        SiteType::AlternateRemote => Arc::new(AlternateBackend),
    }
}

fn sorted_params(req: &Request) -> Vec<(&str, &str)> {
    let mut params: Vec<(&str, &str)> = req
        .params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    // 参数顺序必须稳定，便于排查和测试
    params.sort_by_key(|(k, _)| *k);
    params
}

fn parse_code(token: &str) -> ResultCode {
    match token {
        "0" => ResultCode::Ok,
        "2" => ResultCode::Timeout,
        "3" => ResultCode::NotFound,
        "4" => ResultCode::NotSupported,
        _ => ResultCode::Err,
    }
}

/// 通用后端：查询串式请求 `op=JOIN&pid=..&tid=..`，
/// 响应是 `<code> <payload>` 的单行文本。
pub struct GenericBackend;

impl Backend for GenericBackend {
    fn make_wire(&self) -> Box<dyn Wire> {
        Box::new(TcpWire::new())
    }

    fn build_content(&self, req: &Request) -> String {
        let mut content = format!("op={}", req.rtype);
        for (key, value) in sorted_params(req) {
            content.push('&');
            content.push_str(key);
            content.push('=');
            content.push_str(value);
        }
        content
    }

    fn parse_reply(&self, raw: &str) -> (ResultCode, String) {
        match raw.split_once(' ') {
            Some((code, rest)) => (parse_code(code), rest.to_string()),
            None => (parse_code(raw), String::new()),
        }
    }
}

/// 另一种方言：竖线分隔记录 `JOIN|pid=..|tid=..`（STX/ETX 分帧），
/// 响应是 `<code>|<payload>`。
pub struct AlternateBackend;

impl Backend for AlternateBackend {
    fn make_wire(&self) -> Box<dyn Wire> {
        Box::new(StxWire::new())
    }

    fn build_content(&self, req: &Request) -> String {
        let mut content = req.rtype.to_string();
        for (key, value) in sorted_params(req) {
            content.push('|');
            content.push_str(key);
            content.push('=');
            content.push_str(value);
        }
        content
    }

    fn parse_reply(&self, raw: &str) -> (ResultCode, String) {
        match raw.split_once('|') {
            Some((code, rest)) => (parse_code(code), rest.to_string()),
            None => (parse_code(raw), String::new()),
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! 测试用后端：内容格式沿用通用方言，链路换成 MockWire

    use super::*;
    use crate::wire::mock::MockWire;

    pub(crate) enum MockLink {
        Echo,
        Scripted(Vec<String>),
        Broken,
    }

    pub(crate) struct MockBackend {
        pub(crate) link: MockLink,
        pub(crate) failing_opens: u32,
    }

    impl MockBackend {
        pub(crate) fn echo() -> Arc<Self> {
            Arc::new(Self {
                link: MockLink::Echo,
                failing_opens: 0,
            })
        }

        pub(crate) fn scripted(replies: Vec<&str>) -> Arc<Self> {
            Arc::new(Self {
                link: MockLink::Scripted(replies.into_iter().map(String::from).collect()),
                failing_opens: 0,
            })
        }

        pub(crate) fn broken() -> Arc<Self> {
            Arc::new(Self {
                link: MockLink::Broken,
                failing_opens: 0,
            })
        }

        pub(crate) fn slow_to_open(failing_opens: u32) -> Arc<Self> {
            Arc::new(Self {
                link: MockLink::Echo,
                failing_opens,
            })
        }
    }

    impl Backend for MockBackend {
        fn make_wire(&self) -> Box<dyn Wire> {
            let mut wire = match &self.link {
                MockLink::Echo => MockWire::echo(),
                MockLink::Scripted(replies) => {
                    MockWire::scripted(replies.iter().map(String::as_str).collect())
                }
                MockLink::Broken => MockWire::broken(),
            };
            wire.failing_opens = self.failing_opens;
            Box::new(wire)
        }

        fn build_content(&self, req: &Request) -> String {
            GenericBackend.build_content(req)
        }

        fn parse_reply(&self, raw: &str) -> (ResultCode, String) {
            GenericBackend.parse_reply(raw)
        }
    }
}
