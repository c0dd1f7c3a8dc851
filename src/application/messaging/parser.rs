//! Message parser - Splits prefixed chat text into a command and its parameters

/// A command line after the prefix was stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub command: String,
    pub params: Vec<String>,
}

/// Strip `prefix` and split the rest on whitespace
pub fn parse_command_line(prefix: &str, text: &str) -> Option<CommandLine> {
    if prefix.is_empty() {
        return None;
    }
    let rest = text.strip_prefix(prefix)?;

    let mut parts = rest.split_whitespace().map(str::to_string);
    let command = parts.next()?;

    Some(CommandLine {
        command,
        params: parts.collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_command_and_params() {
        let line = parse_command_line(">", ">plug  on   dice 10001").unwrap();
        assert_eq!(line.command, "plug");
        assert_eq!(line.params, vec!["on", "dice", "10001"]);
    }

    #[test]
    fn ignores_ordinary_chat() {
        let parse = |text| parse_command_line(">", text);
        assert!(parse("hello there").is_none());
        assert!(parse(" >echo hi").is_none());
        assert!(parse(">").is_none());
        assert!(parse(">   ").is_none());
        assert!(parse_command_line("", "echo hi").is_none());
    }

    #[test]
    fn multi_character_prefix() {
        let line = parse_command_line("!!", "!!echo  a b").unwrap();
        assert_eq!(line.command, "echo");
        assert_eq!(line.params, vec!["a", "b"]);
        assert!(parse_command_line("!!", "!echo").is_none());
    }

    #[test]
    fn command_may_follow_prefix_after_space() {
        let line = parse_command_line(">", "> echo hi").unwrap();
        assert_eq!(line.command, "echo");
        assert_eq!(line.params, vec!["hi"]);
    }
}
