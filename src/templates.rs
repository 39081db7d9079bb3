use crate::models::Challenge;

/// Returns the README written into a freshly scaffolded challenge folder.
pub fn readme(challenge: &Challenge) -> String {
    let description = challenge
        .description
        .as_deref()
        .map(html2md::parse_html)
        .unwrap_or_default();

    let mut readme = format!(
        r"# {}

**{}**, {} points

## Description

{}
",
        &challenge.name,
        &challenge.category,
        challenge.value,
        description.trim_end()
    );

    if let Some(connection) = &challenge.connection {
        readme.push_str(&format!("\n## Connection\n\n```\n{connection}\n```\n"));
    }
    readme
}

/// Returns a pwntools starter script, pointed at the challenge service when
/// the connection string looks like `nc host port`.
pub fn solve_script(challenge: &Challenge) -> String {
    let target = challenge
        .connection
        .as_deref()
        .and_then(netcat_target)
        .map(|(host, port)| format!("remote(\"{host}\", {port})"))
        .unwrap_or_else(|| "process(\"./chall\")".to_string());

    format!(
        r#"#!/usr/bin/env python3
# {}
from pwn import *

io = {}

io.interactive()
"#,
        challenge.name, target
    )
}

fn netcat_target(connection: &str) -> Option<(&str, u16)> {
    let mut parts = connection.split_whitespace();
    if parts.next()? != "nc" {
        return None;
    }
    let host = parts.next()?;
    let port = parts.next()?.parse().ok()?;
    Some((host, port))
}
