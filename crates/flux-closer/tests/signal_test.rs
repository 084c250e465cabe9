#![cfg(unix)]

use flux_closer::{Closer, CloserConfig, ExitHandler, ExitSignal, ShutdownPhase, Trigger};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct RecordingExit {
    codes: Mutex<Vec<i32>>,
}

impl ExitHandler for RecordingExit {
    fn exit(&self, code: i32) {
        self.codes.lock().unwrap().push(code);
    }
}

fn send_signal(name: &str) {
    let status = Command::new("kill")
        .arg("-s")
        .arg(name)
        .arg(std::process::id().to_string())
        .status()
        .unwrap();
    assert!(status.success());
}

// 单个测试，避免同一进程内的信号互相干扰
#[test]
fn test_reconfigured_generation_observes_new_signal_set() {
    let exit = Arc::new(RecordingExit::default());
    let closer = Closer::builder()
        .with_signals(&[ExitSignal::User1])
        .with_exit_codes(0, 1)
        .with_exit_handler(exit.clone())
        .build()
        .unwrap();

    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    closer
        .bind(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    closer
        .reconfigure(CloserConfig {
            exit_code_ok: 11,
            exit_code_err: 12,
            signals: vec![ExitSignal::User2],
        })
        .unwrap();
    assert_eq!(closer.generation(), 2);

    // 旧信号不再被监听，旧的一代已退役且没有执行清理
    send_signal("USR1");
    thread::sleep(Duration::from_millis(300));
    assert_eq!(closer.phase(), ShutdownPhase::Waiting);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(exit.codes.lock().unwrap().is_empty());

    send_signal("USR2");
    closer.hold();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(*exit.codes.lock().unwrap(), vec![11]);
    assert_eq!(closer.trigger(), Some(Trigger::Signal(ExitSignal::User2)));
}
