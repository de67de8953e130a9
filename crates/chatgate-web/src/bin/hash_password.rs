//! Prints an argon2 hash for seeding `[[users]]` entries in the config file.
//!
//! Usage: `hash_password [username] [email]`, password read from stdin.

use std::io::{self, Write};

#[path = "../auth/password.rs"]
#[allow(dead_code)]
mod password;

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let username = args.next();
    let email = args.next();

    eprint!("Enter password: ");
    io::stderr().flush()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    let password = password.trim();

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    let hash = password::hash_password(password)?;

    match (username, email) {
        (Some(username), Some(email)) => {
            println!("[[users]]");
            println!("username = \"{username}\"");
            println!("email = \"{email}\"");
            println!("password_hash = \"{hash}\"");
        }
        _ => println!("{hash}"),
    }

    Ok(())
}
