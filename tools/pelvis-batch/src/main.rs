//! 批量提取骨盆.
//!
//! 输入目录与输出目录分别由 `$PELVIS_INPUT_DIR` 与 `$PELVIS_OUTPUT_DIR` 指定,
//! 线程数由 `$PELVIS_WORKERS` 指定, 日志级别由 `$PELVIS_LOG` 指定 (默认 `info`).

mod result;
mod runner;

use log::LevelFilter;
use std::process::ExitCode;

/// 从 `$PELVIS_LOG` 读取日志级别.
fn log_level() -> LevelFilter {
    std::env::var("PELVIS_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LevelFilter::Info)
}

fn main() -> ExitCode {
    simple_logger::SimpleLogger::new()
        .with_level(log_level())
        .init()
        .expect("Logger initialization error");

    let result = match runner::run() {
        Ok(r) => r,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    result.analyze();

    if result.failures() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
