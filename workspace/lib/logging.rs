use anyhow::Result;
use log::LevelFilter;
use log4rs::{
    append::console::{ ConsoleAppender, Target },
    config::{ Appender, Config, Root },
    encode::pattern::PatternEncoder,
};

const ENCODE_STR: &str = "{d(%Y-%m-%d %H:%M:%S)} [{h({l:>5})}] {m}{n}";

/// Send log records at `level` and above to stderr.
pub fn logger_init(level: LevelFilter) -> Result<()> {
    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(ENCODE_STR)))
        .target(Target::Stderr)
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}
