fn main() {
    // GIT_COMMIT_HASH falls back to `None` outside a git checkout.
    if let Err(err) = built::write_built_file() {
        panic!("failed to acquire build-time information: {err}");
    }
}
