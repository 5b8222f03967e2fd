use std::{env, env::VarError};

/// There's no real CLI for the server, so any argument prints the help text and exits.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // WXN_APIV3_KEY is deliberately absent
    const DISPLAY_ENVS: [&str; 14] = [
        "RUST_LOG",
        "WXN_HOST",
        "WXN_PORT",
        "WXN_URL_PREFIX",
        "WXN_DATABASE_URL",
        "WXN_CERT_DIR",
        "WXN_TIMESTAMP_TOLERANCE",
        "WXN_CALLBACK_TIMEOUT",
        "WXN_RESERVATION_TTL",
        "WXN_CERT_REFRESH_COOLDOWN",
        "WXN_CERT_REFRESH_INTERVAL",
        "WXN_NOTIFY_IP_WHITELIST",
        "WXN_USE_X_FORWARDED_FOR",
        "WXN_USE_FORWARDED",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
