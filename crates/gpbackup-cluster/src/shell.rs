//! Quoting shared by every command the dispatcher launches.

/// Quotes `arg` for a POSIX shell.
///
/// Plain words made of safe characters are returned unchanged; everything
/// else is wrapped in single quotes, with embedded single quotes spliced in
/// as `'\''`.
pub fn quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./=:,+@%".contains(&b));
    if safe {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Joins already separated words into one shell command line.
pub fn join<I, S>(words: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    words
        .into_iter()
        .map(|word| quote(word.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Arguments running `command` on `host` through ssh.
///
/// The remote side hands the string to its login shell, so `command` is
/// quoted once more as a whole.
pub fn ssh_args(host: &str, command: &str) -> Vec<String> {
    vec![
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        host.to_string(),
        quote(command),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_words_untouched() {
        assert_eq!(quote("/data/seg0/backups"), "/data/seg0/backups");
        assert_eq!(quote("--oid=16384"), "--oid=16384");
    }

    #[test]
    fn quotes_are_spliced() {
        assert_eq!(quote("it's"), r"'it'\''s'");
        assert_eq!(quote(""), "''");
        assert_eq!(quote("a b"), "'a b'");
        assert_eq!(quote("$HOME"), "'$HOME'");
    }

    #[test]
    fn ssh_quotes_whole_command() {
        let args = ssh_args("sdw1", "mkdir -p '/data 1'");
        assert_eq!(args.last().unwrap(), r"'mkdir -p '\''/data 1'\'''");
        assert_eq!(args[4], "sdw1");
    }

    #[test]
    fn join_words() {
        assert_eq!(join(["rm", "-f", "/tmp/x y"]), "rm -f '/tmp/x y'");
    }
}
