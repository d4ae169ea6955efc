//! 传输层抽象
//!
//! Wire trait 把 Connection 工作者与具体后端的链路实现解耦：
//! 通用后端用换行分帧的 TCP 文本流，另一种方言用 STX/ETX 分帧。
//! 工作者对每条请求做一次阻塞式交换（写出 + 限时读回）。

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use protocol::{
    ProtocolError, Result, ServerAddress, CONNECT_TIMEOUT, MAX_RESPONSE_LEN, READ_TIMEOUT,
};

/// 一条链路
#[async_trait]
pub trait Wire: Send {
    /// 建立链路（单次尝试，重试由工作者负责）
    async fn open(&mut self, addr: &ServerAddress) -> Result<()>;

    /// 写出一条请求内容并限时读回一条原始响应
    async fn exchange(&mut self, content: &str) -> Result<String>;

    /// 关闭链路
    async fn close(&mut self);

    /// 链路是否已建立
    fn is_open(&self) -> bool;
}

/// 换行分帧的 TCP 链路（通用后端方言）
pub struct TcpWire {
    stream: Option<BufReader<TcpStream>>,
}

impl TcpWire {
    pub fn new() -> Self {
        Self { stream: None }
    }
}

impl Default for TcpWire {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Wire for TcpWire {
    async fn open(&mut self, addr: &ServerAddress) -> Result<()> {
        let stream = timeout(
            CONNECT_TIMEOUT,
            TcpStream::connect((addr.host.as_str(), addr.port)),
        )
        .await
        .map_err(|_| ProtocolError::ConnectionTimeout)?
        .map_err(ProtocolError::Io)?;

        stream.set_nodelay(true)?;
        self.stream = Some(BufReader::new(stream));
        Ok(())
    }

    async fn exchange(&mut self, content: &str) -> Result<String> {
        let stream = self
            .stream
            .as_mut()
            .ok_or(ProtocolError::ConnectionClosed)?;

        stream.write_all(content.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;

        let mut line = String::new();
        let n = timeout(READ_TIMEOUT, stream.read_line(&mut line))
            .await
            .map_err(|_| ProtocolError::ConnectionTimeout)??;
        if n == 0 {
            self.stream = None;
            return Err(ProtocolError::ConnectionClosed);
        }
        if line.len() > MAX_RESPONSE_LEN {
            return Err(ProtocolError::ResponseTooLarge {
                size: line.len(),
                max: MAX_RESPONSE_LEN,
            });
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

/// STX/ETX 分帧记录
const STX: u8 = 0x02;
const ETX: u8 = 0x03;

/// STX/ETX 分帧的 TCP 链路（另一种后端方言）
pub struct StxWire {
    stream: Option<BufReader<TcpStream>>,
}

impl StxWire {
    pub fn new() -> Self {
        Self { stream: None }
    }
}

impl Default for StxWire {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Wire for StxWire {
    async fn open(&mut self, addr: &ServerAddress) -> Result<()> {
        let stream = timeout(
            CONNECT_TIMEOUT,
            TcpStream::connect((addr.host.as_str(), addr.port)),
        )
        .await
        .map_err(|_| ProtocolError::ConnectionTimeout)?
        .map_err(ProtocolError::Io)?;

        stream.set_nodelay(true)?;
        self.stream = Some(BufReader::new(stream));
        Ok(())
    }

    async fn exchange(&mut self, content: &str) -> Result<String> {
        let stream = self
            .stream
            .as_mut()
            .ok_or(ProtocolError::ConnectionClosed)?;

        stream.write_all(&[STX]).await?;
        stream.write_all(content.as_bytes()).await?;
        stream.write_all(&[ETX]).await?;
        stream.flush().await?;

        let mut frame = Vec::new();
        let n = timeout(READ_TIMEOUT, stream.read_until(ETX, &mut frame))
            .await
            .map_err(|_| ProtocolError::ConnectionTimeout)??;
        if n == 0 {
            self.stream = None;
            return Err(ProtocolError::ConnectionClosed);
        }
        if frame.len() > MAX_RESPONSE_LEN {
            return Err(ProtocolError::ResponseTooLarge {
                size: frame.len(),
                max: MAX_RESPONSE_LEN,
            });
        }

        // 去掉分帧字节
        if frame.last() == Some(&ETX) {
            frame.pop();
        }
        let start = if frame.first() == Some(&STX) { 1 } else { 0 };
        String::from_utf8(frame[start..].to_vec())
            .map_err(|_| ProtocolError::MalformedRecord("non-utf8 frame".to_string()))
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_wire_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            assert_eq!(line, "op=LIST&pid=alice\n");
            reader.write_all(b"0 T1,1,1500/300/20,,0,,0\n").await.unwrap();
        });

        let mut wire = TcpWire::new();
        wire.open(&ServerAddress::new("127.0.0.1", port))
            .await
            .unwrap();
        assert!(wire.is_open());

        let reply = wire.exchange("op=LIST&pid=alice").await.unwrap();
        assert_eq!(reply, "0 T1,1,1500/300/20,,0,,0");

        wire.close().await;
        assert!(!wire.is_open());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_stx_wire_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            loop {
                let mut byte = [0u8; 1];
                stream.read_exact(&mut byte).await.unwrap();
                buf.push(byte[0]);
                if byte[0] == 0x03 {
                    break;
                }
            }
            assert_eq!(buf.first(), Some(&0x02));
            stream.write_all(b"\x020|ok\x03").await.unwrap();
        });

        let mut wire = StxWire::new();
        wire.open(&ServerAddress::new("127.0.0.1", port))
            .await
            .unwrap();

        let reply = wire.exchange("LIST|pid=alice").await.unwrap();
        assert_eq!(reply, "0|ok");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_without_open() {
        let mut wire = TcpWire::new();
        assert!(wire.exchange("op=LIST").await.is_err());
    }
}
