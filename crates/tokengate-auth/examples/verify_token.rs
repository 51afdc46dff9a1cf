//! Check a bearer token against a secret and print the outcome
//!
//! Usage:
//!   cargo run --example verify_token -- --secret "your-secret-key" <TOKEN>

use clap::Parser;
use tokengate_auth::{AuthResult, AuthorityConfig, TokenAuthority, DEFAULT_ISSUER};

#[derive(Parser, Debug)]
#[command(name = "verify_token")]
#[command(about = "Verify a tokengate bearer token", long_about = None)]
struct Args {
    /// JWT secret (must match the server's secret)
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    secret: String,

    /// Expected issuer
    #[arg(long, default_value = DEFAULT_ISSUER)]
    issuer: String,

    /// Token to verify
    token: String,
}

fn main() {
    let args = Args::parse();

    let config = AuthorityConfig::new(args.secret.into_bytes()).with_issuer(args.issuer);
    let authority = match TokenAuthority::new(config) {
        Ok(authority) => authority,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    match authority.verify(Some(args.token.as_str())) {
        AuthResult::Valid(principal) => {
            println!("valid");
            println!("  user_id:  {}", principal.user_id);
            println!("  username: {}", principal.username);
            println!("  role:     {}", principal.role);
        }
        AuthResult::Expired => {
            println!("expired");
            std::process::exit(1);
        }
        AuthResult::Invalid => {
            println!("invalid");
            std::process::exit(1);
        }
        AuthResult::Missing => {
            println!("missing");
            std::process::exit(1);
        }
    }
}
