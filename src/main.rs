//! VSTS Deploy Agent
//!
//! Usage:
//! - Normal mode: `vsts-deploy-agent`
//! - With custom port: `vsts-deploy-agent --port 19999`

use vsts_deploy_agent::RuntimeConfig;

/// 解析命令行参数
fn parse_args() -> RuntimeConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = RuntimeConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                config.port_override = args[i + 1].parse().ok();
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    config
}

fn print_help() {
    println!("VSTS Deploy Agent - 同步 VSTS 仓库到身份平台");
    println!();
    println!("USAGE:");
    println!("    vsts-deploy-agent [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --port <PORT>    Override the listening port");
    println!("    -h, --help       Print help information");
    println!();
    println!("ENVIRONMENT:");
    println!("    TFS_TYPE, TFS_INSTANCE, TFS_COLLECTION, TFS_PROJECT, TFS_PATH, TFS_BRANCH");
    println!("    TFS_USERNAME, TFS_TOKEN, EXTENSION_SECRET, APPLY_URL, AUTH0_DOMAIN");
}

fn main() {
    let config = parse_args();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let result = rt.block_on(vsts_deploy_agent::init_and_run_with_config(config));

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
