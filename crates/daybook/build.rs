use vergen_gitcl::{BuildBuilder, CargoBuilder, Emitter, GitclBuilder};

/// git が使えない環境（コンテナビルドなど）で参照するコミット SHA の環境変数
const SHA_FALLBACK_VARS: [&str; 2] = ["GITHUB_SHA", "SOURCE_COMMIT"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    for var in SHA_FALLBACK_VARS {
        println!("cargo::rerun-if-env-changed={var}");
    }

    let build = BuildBuilder::default().build_date(true).build()?;
    let cargo = CargoBuilder::default().target_triple(true).build()?;
    let gitcl = GitclBuilder::default().sha(true).build()?;

    let emitted = Emitter::default()
        .add_instructions(&build)?
        .add_instructions(&cargo)?
        .add_instructions(&gitcl)?
        .emit();

    if emitted.is_err() {
        emit_fallback();
    }

    Ok(())
}

fn emit_fallback() {
    println!("cargo::rustc-env=VERGEN_BUILD_DATE=unknown");
    println!("cargo::rustc-env=VERGEN_CARGO_TARGET_TRIPLE=unknown");

    let sha = SHA_FALLBACK_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .map(|sha| sha.chars().take(7).collect::<String>())
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo::rustc-env=VERGEN_GIT_SHA={sha}");
}
