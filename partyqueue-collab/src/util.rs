use rand::{distributions::Alphanumeric, thread_rng, Rng};

pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

/// Like [random_string], but lowercase so it reads well in a url.
pub fn random_slug(length: usize) -> String {
    random_string(length).to_ascii_lowercase()
}
