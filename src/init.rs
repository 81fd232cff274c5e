use env_logger::Env;

/// 初始化日誌系統，預設只輸出 warn 以上，RUST_LOG 可覆寫
pub fn init() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp_secs()
        .init();
}
