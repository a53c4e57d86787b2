use std::sync::LazyLock;

/// Defines the application version.
///
/// The git part is only present when the build ran inside a git checkout.
pub static VERSION: LazyLock<String> = LazyLock::new(|| {
    let release = env!("RELEASE_VERSION");
    match option_env!("VERGEN_GIT_SHA") {
        Some(sha) => format!(
            "{release}-{}{}",
            short_sha(sha),
            if option_env!("VERGEN_GIT_DIRTY") == Some("true") {
                "-dirty"
            } else {
                ""
            }
        ),
        None => release.to_string(),
    }
});

fn short_sha(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}
