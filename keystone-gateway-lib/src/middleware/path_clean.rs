/// Canonicalise a request path before route matching
///
/// Collapses `.` and `..` segments, removes empty segments, and drops a
/// trailing slash (the root stays "/"). The result always starts with
/// "/".
pub fn clean(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }

    if stack.is_empty() {
        return "/".to_string();
    }

    let mut cleaned = String::with_capacity(path.len());
    for segment in stack {
        cleaned.push('/');
        cleaned.push_str(segment);
    }
    cleaned
}
