use crate::env;
use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::Lazy;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

#[derive(Debug)]
struct Logger {
    level: LevelFilter,
    term_level: LevelFilter,
    file_level: LevelFilter,
    log_file: Option<Mutex<File>>,
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if record.level() <= self.file_level
            && let Some(log_file) = &self.log_file
        {
            let mut log_file = log_file.lock().unwrap_or_else(|e| e.into_inner());
            let out = format!(
                "{now} {level:<5} {target} {args}",
                now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                level = record.level(),
                target = record.target(),
                args = record.args()
            );
            let _ = writeln!(log_file, "{}", console::strip_ansi_codes(&out));
        }
        if record.level() <= self.term_level {
            eprintln!("{}", self.render(record));
        }
    }

    fn flush(&self) {}
}

impl Logger {
    fn init() -> Self {
        let term_level = *env::SYNCWARDEN_LOG;
        let file_level = *env::SYNCWARDEN_LOG_FILE_LEVEL;
        let log_file = open_log_file();
        let level = if log_file.is_some() {
            term_level.max(file_level)
        } else {
            term_level
        };
        Self {
            level,
            term_level,
            file_level,
            log_file: log_file.map(Mutex::new),
        }
    }

    fn render(&self, record: &Record) -> String {
        let level = match record.level() {
            Level::Error => console::style("ERROR").red().bold(),
            Level::Warn => console::style("WARN").yellow().bold(),
            Level::Info => console::style("INFO").cyan(),
            Level::Debug => console::style("DEBUG").blue(),
            Level::Trace => console::style("TRACE").dim(),
        };
        match self.term_level {
            LevelFilter::Trace | LevelFilter::Debug => {
                let now = chrono::Local::now().format("%H:%M:%S%.3f");
                format!(
                    "{} {level} {} {}",
                    console::style(now).dim(),
                    console::style(record.target()).dim(),
                    record.args()
                )
            }
            _ => format!("syncwarden {level} {}", record.args()),
        }
    }
}

fn open_log_file() -> Option<File> {
    let path = &*env::SYNCWARDEN_LOG_FILE;
    if let Some(parent) = path.parent()
        && let Err(err) = std::fs::create_dir_all(parent)
    {
        eprintln!("syncwarden: could not create log dir {}: {err}", parent.display());
        return None;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| eprintln!("syncwarden: could not open {}: {err}", path.display()))
        .ok()
}

static LOGGER: Lazy<Logger> = Lazy::new(Logger::init);

pub fn init() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        if let Err(err) = log::set_logger(&*LOGGER).map(|()| log::set_max_level(LOGGER.level)) {
            eprintln!("syncwarden: could not initialize logger: {err}");
        }
    });
}
