use clap::Parser;
use sessiongate::application_impl::hash_password;

/// Print an Argon2 PHC hash for a `[[users]]` entry.
#[derive(Parser, Debug)]
struct Args {
    password: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let hash = hash_password(&args.password)?;
    println!("{hash}");
    Ok(())
}
