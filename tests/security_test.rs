// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

#[cfg(test)]
mod security_tests {
    //! # 安全回归测试
    //!
    //! 通过真实的 TCP 连接模拟常见攻击：
    //! - 路径遍历（含 `..`、编码、空字节）
    //! - 畸形报文与不支持的方法/版本（必须零字节断开）
    //! - 超大请求头
    //! - 慢速连接（空闲超时）与连接数上限

    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::watch;

    use vhost_webserver::{Config, MemorySink, Server};

    const SECRET: &[u8] = b"top secret outside the document root";

    struct TestServer {
        addr: SocketAddr,
        log: Arc<MemorySink>,
        _dir: tempfile::TempDir,
        _shutdown: watch::Sender<bool>,
    }

    /// 目录结构：`<tmp>/secret.txt` 与 `<tmp>/www/index.html`，文档根目录为 `www`
    async fn start(extra: &str) -> TestServer {
        let dir = tempfile::tempdir().unwrap();
        let www = dir.path().join("www");
        std::fs::create_dir(&www).unwrap();
        std::fs::write(www.join("index.html"), b"<html>public</html>").unwrap();
        std::fs::write(dir.path().join("secret.txt"), SECRET).unwrap();

        let toml = format!(
            "log = '{}'\nkeep_alive_timeout = 1\nrequest_buffer_limit = 1024\n{}\n\
             [[server]]\nvhost = \"localhost\"\nip = \"127.0.0.1\"\nport = 0\ndocumentroot = '{}'\n",
            dir.path().join("logs").display(),
            extra,
            www.display()
        );
        let config = Config::from_toml(&toml).unwrap();
        let table = config.virtual_hosts().unwrap();
        let log = Arc::new(MemorySink::new());
        let server = Server::bind(&config, &table, log.clone()).await.unwrap();
        let addr = server.local_addrs()[0];
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(server.run(shutdown_rx));

        TestServer {
            addr,
            log,
            _dir: dir,
            _shutdown: shutdown_tx,
        }
    }

    /// 发送原始字节并读到连接关闭。设置硬超时，防止服务器挂起时测试永久阻塞。
    async fn send_raw(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        // 服务器可能在读完前就断开，写失败不影响断言
        let _ = stream.write_all(request).await;
        let mut all = Vec::new();
        let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut all))
            .await
            .expect("服务器没有关闭连接");
        all
    }

    fn extract_status_code(response: &[u8]) -> u16 {
        String::from_utf8_lossy(response)
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse().ok())
            .unwrap_or(0)
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    /// ## 攻击向量：路径遍历
    /// 任何 `..` 段都不能读到文档根目录之外的文件。
    #[tokio::test]
    async fn test_path_traversal() {
        let server = start("").await;
        let attacks = [
            "GET /../secret.txt HTTP/1.1\r\nHost: localhost\r\n\r\n",
            "GET /./../secret.txt HTTP/1.1\r\nHost: localhost\r\n\r\n",
            "GET /nested/../../secret.txt HTTP/1.1\r\nHost: localhost\r\n\r\n",
            "GET /../../../../../../etc/passwd HTTP/1.1\r\nHost: localhost\r\n\r\n",
            "GET ../secret.txt HTTP/1.1\r\nHost: localhost\r\n\r\n",
            "GET //../secret.txt HTTP/1.1\r\nHost: localhost\r\n\r\n",
        ];

        for attack in attacks {
            let response = send_raw(server.addr, attack.as_bytes()).await;
            assert_eq!(extract_status_code(&response), 404, "attack: {}", attack);
            assert!(response.ends_with(b"REQUESTED RESOURCE NOT FOUND\r\n"));
            assert!(!contains(&response, SECRET));
        }
    }

    /// ## 攻击向量：编码后的遍历
    /// 除 `%20` 外不做百分号解码，`%2e%2e` 只是普通文件名。
    #[tokio::test]
    async fn test_path_traversal_encoded() {
        let server = start("").await;
        for attack in [
            "GET /%2e%2e/secret.txt HTTP/1.1\r\nHost: localhost\r\n\r\n",
            "GET /..%2fsecret.txt HTTP/1.1\r\nHost: localhost\r\n\r\n",
            "GET /%2e%2e%2fsecret.txt HTTP/1.1\r\nHost: localhost\r\n\r\n",
        ] {
            let response = send_raw(server.addr, attack.as_bytes()).await;
            assert_eq!(extract_status_code(&response), 404, "attack: {}", attack);
            assert!(!contains(&response, SECRET));
        }
    }

    #[tokio::test]
    async fn test_null_byte_injection() {
        let server = start("").await;
        let response = send_raw(
            server.addr,
            b"GET /index.html\0.txt HTTP/1.1\r\nHost: localhost\r\n\r\n",
        )
        .await;
        assert_eq!(extract_status_code(&response), 404);
    }

    /// ## 协议健壮性
    /// 不支持的方法、版本以及残缺的请求行都必须零字节断开，且不写访问日志。
    #[tokio::test]
    async fn test_rejected_requests_get_zero_bytes() {
        let server = start("").await;
        let requests: [&[u8]; 9] = [
            b"POST / HTTP/1.1\r\nHost: localhost\r\n\r\n",
            b"PUT / HTTP/1.1\r\nHost: localhost\r\n\r\n",
            b"OPTIONS * HTTP/1.1\r\nHost: localhost\r\n\r\n",
            b"get / HTTP/1.1\r\nHost: localhost\r\n\r\n",
            b"GET / HTTP/1.0\r\nHost: localhost\r\n\r\n",
            b"GET / HTTP/2.0\r\nHost: localhost\r\n\r\n",
            b"GET /\r\nHost: localhost\r\n\r\n",
            b"\r\n\r\n",
            b"GET /\xc3\x28 HTTP/1.1\r\nHost: localhost\r\n\r\n",
        ];

        for request in requests {
            let response = send_raw(server.addr, request).await;
            assert!(
                response.is_empty(),
                "request: {:?}",
                String::from_utf8_lossy(request)
            );
        }
        assert!(server.log.lines().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_request_line() {
        let server = start("").await;
        let request = format!("GET /{} HTTP/1.1\r\nHost: localhost\r\n\r\n", "a".repeat(4096));
        assert!(send_raw(server.addr, request.as_bytes()).await.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_header() {
        let server = start("").await;
        let request = format!(
            "GET / HTTP/1.1\r\nHost: localhost\r\nX-Large-Header: {}\r\n\r\n",
            "x".repeat(8192)
        );
        assert!(send_raw(server.addr, request.as_bytes()).await.is_empty());
    }

    #[tokio::test]
    async fn test_crlf_injection() {
        let server = start("").await;
        let response = send_raw(
            server.addr,
            b"GET /%0d%0aSet-Cookie:%20evil=1 HTTP/1.1\r\nHost: localhost\r\n\r\n",
        )
        .await;
        assert_eq!(extract_status_code(&response), 404);
        assert!(!contains(&response, b"\r\nSet-Cookie"));
    }

    #[tokio::test]
    async fn test_case_sensitive_method_and_insensitive_headers() {
        let server = start("").await;
        let response = send_raw(
            server.addr,
            b"GET / HTTP/1.1\r\nHOST: localhost\r\nuser-agent: Lower\r\n\r\n",
        )
        .await;
        assert_eq!(extract_status_code(&response), 200);
        assert!(server.log.lines()[0].1.ends_with("\"Lower\""));
    }

    /// ## 慢速连接：空闲超时
    /// 连上后一直不发数据的客户端会在超时后被断开。
    #[tokio::test]
    async fn test_slowloris_idle_connection_closed() {
        let server = start("").await;
        let started = Instant::now();
        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\nHost: loc").await.unwrap();

        let mut all = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut all))
            .await
            .expect("空闲连接没有被关闭")
            .unwrap();
        assert!(all.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(900));
        assert!(server.log.lines().is_empty());
    }

    #[tokio::test]
    async fn test_request_split_across_writes() {
        let server = start("").await;
        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        stream.write_all(b"Host: localhost\r\n\r\n").await.unwrap();

        let mut all = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut all))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(extract_status_code(&all), 200);
        assert!(all.ends_with(b"<html>public</html>"));
    }

    /// ## 连接数上限
    /// 上限为 1 时，第二个连接要等第一个连接空闲超时后才会被处理。
    #[tokio::test]
    async fn test_connection_limit_queues() {
        let server = start("max_connections = 1").await;
        let _idle = TcpStream::connect(server.addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        let response = send_raw(server.addr, b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert_eq!(extract_status_code(&response), 200);
        assert!(started.elapsed() >= Duration::from_millis(500));
    }
}
