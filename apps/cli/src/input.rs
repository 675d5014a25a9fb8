//! 交互输入
//!
//! 专用输入线程运行 rustyline（保留历史记录），通过有界通道把输入行发给主线程。
//! 主线程用带超时的接收轮询，期间可以检查 Ctrl+C 标志。

use crate::validation::is_quit;
use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::thread;
use std::time::Duration;

const HISTORY_FILE: &str = ".htmotor_history";

/// 输入线程产生的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Line(String),
    /// 编辑器内按下 Ctrl+C
    Interrupted,
    /// Ctrl+D 或输入线程结束
    Closed,
}

/// 行输入（专用线程）
pub struct LineInput {
    rx: Receiver<InputEvent>,
    _thread: thread::JoinHandle<Result<()>>,
}

impl LineInput {
    /// 启动输入线程
    pub fn spawn(prompt: &str) -> Self {
        let (tx, rx) = bounded::<InputEvent>(10);
        let prompt = prompt.to_string();

        let handle = thread::spawn(move || {
            let mut rl = DefaultEditor::new()
                .map_err(|e| anyhow::anyhow!("Failed to initialize readline: {}", e))?;
            rl.load_history(HISTORY_FILE).ok(); // 首次运行没有历史文件

            loop {
                let event = match rl.readline(&prompt) {
                    Ok(line) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        let _ = rl.add_history_entry(line.as_str());
                        InputEvent::Line(line)
                    },
                    Err(ReadlineError::Interrupted) => InputEvent::Interrupted,
                    Err(ReadlineError::Eof) => InputEvent::Closed,
                    Err(err) => {
                        eprintln!("Error: {:?}", err);
                        InputEvent::Closed
                    },
                };

                // 退出命令之后不再进入 readline，终端不会停留在 raw 模式
                let done = match &event {
                    InputEvent::Line(line) => is_quit(&line.to_lowercase()),
                    InputEvent::Interrupted | InputEvent::Closed => true,
                };
                if tx.send(event).is_err() || done {
                    break;
                }
            }

            rl.save_history(HISTORY_FILE).ok();
            Ok(())
        });

        Self {
            rx,
            _thread: handle,
        }
    }

    /// 等待下一条输入，超时返回 `None`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<InputEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(InputEvent::Closed),
        }
    }
}
