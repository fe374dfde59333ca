use std::io::Read;
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use heif_converter::{ConvertError, ConvertOptions, FallbackRegistry, HeifConverter, LocalPlatform};

/// 接受连接后从不应答的服务：收到请求时发送 `"accepted"`，连接被对端关闭时发送 `"closed"`。
fn hanging_server() -> (u16, mpsc::Receiver<&'static str>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
    let port = listener.local_addr().expect("read local addr failed").port();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf);
        let _ = tx.send("accepted");

        loop {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => {
                    let _ = tx.send("closed");
                    return;
                }
                Ok(_) => continue,
            }
        }
    });

    (port, rx)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_closes_connection_and_suppresses_callback() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (port, events) = hanging_server();
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);

    let converter = HeifConverter::new(Arc::new(LocalPlatform::new()))
        .with_fallback_registry(Arc::new(FallbackRegistry::new()));
    let options = ConvertOptions::builder()
        .from_url(format!("http://127.0.0.1:{}/slow.heic", port))
        .build();

    let task = converter.convert_with_callback(options, &tokio::runtime::Handle::current(), move |_| {
        flag.store(true, Ordering::SeqCst);
    });

    assert_eq!(
        events.recv_timeout(Duration::from_secs(5)).expect("request should arrive"),
        "accepted"
    );
    assert!(task.cancel());
    assert_eq!(
        events.recv_timeout(Duration::from_secs(5)).expect("connection should close"),
        "closed"
    );

    assert!(matches!(task.wait().await, Err(ConvertError::Cancelled(_))));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn completed_task_cannot_be_cancelled() {
    let converter = HeifConverter::new(Arc::new(LocalPlatform::new()))
        .with_fallback_registry(Arc::new(FallbackRegistry::new()));
    let options = ConvertOptions::builder()
        .from_bytes(vec![1u8, 2, 3, 4])
        .expect("bytes")
        .build();
    let (tx, rx) = mpsc::channel();

    let task = converter.convert_with_callback(options, &tokio::runtime::Handle::current(), move |result| {
        let _ = tx.send(result.map(|r| r.image.is_none()));
    });

    for _ in 0..200 {
        if task.is_finished() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(!task.cancel());
    let unrecognised = rx.try_recv().expect("callback delivered").expect("soft failure");
    assert!(unrecognised);
}
