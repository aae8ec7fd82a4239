//! Shared fixtures for wt-agent integration tests

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use wt_agent::actors::{SignalEvent, TerminationSignals};
use wt_core::Config;

/// A port the OS just handed out, released again for the test to bind
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn test_config(name: &str) -> Config {
    Config {
        name: name.to_string(),
        remote: "127.0.0.1:1".to_string(),
        remote_host: "127.0.0.1".to_string(),
        remote_port: 1,
        local_port: Some(free_port()),
        terminal: None,
        username: String::new(),
        password: String::new(),
        save_pass: false,
        timeout: Duration::from_secs(30),
        max_runtime: Duration::from_secs(3600),
        debug: false,
        assets_dir: None,
    }
}

/// Signal source driven by the test
pub struct ManualSignals(Mutex<Option<mpsc::Receiver<SignalEvent>>>);

impl ManualSignals {
    pub fn new() -> (mpsc::Sender<SignalEvent>, Arc<Self>) {
        let (tx, rx) = mpsc::channel(1);
        (tx, Arc::new(Self(Mutex::new(Some(rx)))))
    }
}

impl TerminationSignals for ManualSignals {
    fn register(&self) -> io::Result<mpsc::Receiver<SignalEvent>> {
        self.0
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| io::Error::other("already registered"))
    }
}
