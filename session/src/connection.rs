//! 连接工作者
//!
//! 每条连接一个后台任务：从 FIFO 队列取请求，在链路上做一次
//! 阻塞式交换，把结果包成带请求类型标签的 Response 异步回投给
//! 请求指定的接收端。工作者从不直接改动 Table/Player 状态。
//!
//! 顺序保证：同一条连接上，响应按请求入队顺序回投；
//! SHUTDOWN 之前入队的请求都会被处理，之后入队的请求被丢弃、
//! 永远不会有响应。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::sleep;
use tracing::{debug, warn};

use protocol::{Request, RequestType, Response, ServerAddress, RETRY_BACKOFF};

use crate::backend::Backend;
use crate::wire::Wire;

/// 一条到远端端点的连接
pub struct Connection {
    req_tx: UnboundedSender<Request>,
    connected: Arc<AtomicBool>,
    shutdown_requested: Arc<AtomicBool>,
}

impl Connection {
    /// 启动工作者任务（必须在 tokio 运行时内调用）
    pub fn start(address: ServerAddress, backend: Arc<dyn Backend>) -> Self {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));
        let shutdown_requested = Arc::new(AtomicBool::new(false));

        tokio::spawn(worker(
            address,
            backend,
            req_rx,
            Arc::clone(&connected),
            Arc::clone(&shutdown_requested),
        ));

        Self {
            req_tx,
            connected,
            shutdown_requested,
        }
    }

    /// 入队一条请求（线程安全，FIFO，无界）
    ///
    /// 关停开始之后的请求直接丢弃，不会产生响应。
    pub fn add_request(&self, req: Request) {
        if self.shutdown_requested.load(Ordering::Acquire) {
            warn!(rtype = %req.rtype, "Request enqueued after shutdown, dropped");
            return;
        }
        if self.req_tx.send(req).is_err() {
            warn!("Connection worker is gone, request dropped");
        }
    }

    /// 请求工作者清空队列后退出
    pub fn shutdown(&self) {
        if self.shutdown_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        // 直接入队，绕过 add_request 的关停丢弃逻辑
        let _ = self.req_tx.send(Request::new(RequestType::Shutdown));
    }

    /// 链路当前是否可用
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

async fn worker(
    address: ServerAddress,
    backend: Arc<dyn Backend>,
    mut req_rx: UnboundedReceiver<Request>,
    connected: Arc<AtomicBool>,
    shutdown_requested: Arc<AtomicBool>,
) {
    let mut wire = backend.make_wire();

    while let Some(req) = req_rx.recv().await {
        if req.rtype == RequestType::Shutdown {
            debug!(endpoint = %address, "Connection worker shutting down");
            wire.close().await;
            connected.store(false, Ordering::Release);
            break;
        }

        let response = handle_request(
            &address,
            backend.as_ref(),
            wire.as_mut(),
            &req,
            &connected,
            &shutdown_requested,
        )
        .await;

        match (response, &req.reply_to) {
            (Some(resp), Some(sink)) => {
                // 只投递，不同步回调；接收端在协调上下文里消化
                if sink.send(resp).is_err() {
                    debug!(rtype = %req.rtype, "Reply target dropped, response discarded");
                }
            }
            (Some(resp), None) => {
                debug!(rtype = %resp.rtype, code = ?resp.code, "Fire-and-forget request done");
            }
            (None, _) => {}
        }
    }

    connected.store(false, Ordering::Release);
}

/// 处理一条请求；返回 None 表示关停打断、不回投任何响应
async fn handle_request(
    address: &ServerAddress,
    backend: &dyn Backend,
    wire: &mut dyn Wire,
    req: &Request,
    connected: &AtomicBool,
    shutdown_requested: &AtomicBool,
) -> Option<Response> {
    if req.rtype == RequestType::Connect && !wire.is_open() {
        // 建连失败按固定间隔重试，直到成功或关停
        loop {
            if shutdown_requested.load(Ordering::Acquire) {
                debug!(endpoint = %address, "Shutdown during connect retry");
                return None;
            }
            match wire.open(address).await {
                Ok(()) => {
                    connected.store(true, Ordering::Release);
                    break;
                }
                Err(err) => {
                    warn!(endpoint = %address, %err, "Connect failed, will retry");
                    sleep(RETRY_BACKOFF).await;
                }
            }
        }
    } else if !wire.is_open() {
        return Some(Response::error(
            req.rtype,
            format!("not connected to {}", address),
        ));
    }

    let content = backend.build_content(req);
    match wire.exchange(&content).await {
        Ok(raw) => {
            let (code, payload) = backend.parse_reply(&raw);
            Some(Response {
                rtype: req.rtype,
                code,
                content: payload,
            })
        }
        Err(err) => {
            // 传输错误包成失败响应交给上层定夺，不在工作者里重试
            if !wire.is_open() {
                connected.store(false, Ordering::Release);
            }
            Some(Response::error(req.rtype, err.to_string()))
        }
    }
}
