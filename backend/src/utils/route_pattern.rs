/// Set of path globs where `*` matches any run of characters, `/` included.
///
/// Patterns and paths are compared without their leading and trailing
/// slashes, so `health-check` matches a request to `/health-check/`. The root
/// path is represented as `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePatterns(Vec<String>);

impl RoutePatterns {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            patterns
                .into_iter()
                .filter(|pattern| !pattern.as_ref().trim().is_empty())
                .map(|pattern| normalize(pattern.as_ref()).to_string())
                .collect(),
        )
    }

    pub fn is_match(&self, path: &str) -> bool {
        let path = normalize(path);
        self.0.iter().any(|pattern| glob_match(pattern, path))
    }

    pub fn patterns(&self) -> &[String] {
        &self.0
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Case-sensitive wildcard match over the whole input.
pub fn glob_match(pattern: &str, input: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let input: Vec<char> = input.chars().collect();

    let (mut p, mut i) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while i < input.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, i));
            p += 1;
        } else if p < pattern.len() && pattern[p] == input[i] {
            p += 1;
            i += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            i = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}
