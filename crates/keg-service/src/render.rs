//! Supervisor-specific renderings of a [`ServiceDescriptor`].

use std::fmt::Write;
use std::path::{Path, PathBuf};

use keg_resource::RestartPolicy;

use crate::descriptor::ServiceDescriptor;

const DEV_NULL: &str = "/dev/null";

impl ServiceDescriptor {
    /// A systemd service unit.
    pub fn to_systemd_unit(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "[Unit]");
        let _ = writeln!(out, "Description={} {} ({})", self.name, self.version, self.label);
        let _ = writeln!(out, "After=network.target");
        let _ = writeln!(out);

        let _ = writeln!(out, "[Service]");
        let _ = writeln!(out, "Type=simple");
        let exec: Vec<String> = self.command_line().iter().map(|a| systemd_quote(a)).collect();
        let _ = writeln!(out, "ExecStart={}", exec.join(" "));
        let _ = writeln!(out, "WorkingDirectory={}", self.working_dir.display());
        for (key, value) in &self.env {
            let _ = writeln!(out, "Environment={}", systemd_quote(&format!("{key}={value}")));
        }
        let restart = match self.restart {
            RestartPolicy::Always => "always",
            RestartPolicy::OnFailure => "on-failure",
            RestartPolicy::Never => "no",
        };
        let _ = writeln!(out, "Restart={restart}");
        let _ = writeln!(out, "StandardOutput={}", systemd_output(self.stdout.as_deref()));
        let _ = writeln!(out, "StandardError={}", systemd_output(self.stderr.as_deref()));

        if self.run_at_load {
            let _ = writeln!(out);
            let _ = writeln!(out, "[Install]");
            let _ = writeln!(out, "WantedBy=default.target");
        }
        out
    }

    /// A launchd property list.
    pub fn to_launchd_plist(&self) -> String {
        let mut out = String::new();
        out.push_str(concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" ",
            "\"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
            "<plist version=\"1.0\">\n",
            "  <dict>\n",
        ));

        plist_key(&mut out, "Label");
        plist_string(&mut out, 4, &self.label);

        plist_key(&mut out, "KeepAlive");
        match self.restart {
            RestartPolicy::Always => out.push_str("    <true/>\n"),
            RestartPolicy::Never => out.push_str("    <false/>\n"),
            RestartPolicy::OnFailure => {
                out.push_str("    <dict>\n");
                out.push_str("      <key>SuccessfulExit</key>\n");
                out.push_str("      <false/>\n");
                out.push_str("    </dict>\n");
            }
        }

        plist_key(&mut out, "RunAtLoad");
        out.push_str(if self.run_at_load {
            "    <true/>\n"
        } else {
            "    <false/>\n"
        });

        plist_key(&mut out, "ProgramArguments");
        out.push_str("    <array>\n");
        for arg in self.command_line() {
            plist_string(&mut out, 6, &arg);
        }
        out.push_str("    </array>\n");

        if !self.env.is_empty() {
            plist_key(&mut out, "EnvironmentVariables");
            out.push_str("    <dict>\n");
            for (key, value) in &self.env {
                let _ = writeln!(out, "      <key>{}</key>", xml_escape(key));
                plist_string(&mut out, 6, value);
            }
            out.push_str("    </dict>\n");
        }

        plist_key(&mut out, "WorkingDirectory");
        plist_string(&mut out, 4, &self.working_dir.display().to_string());
        plist_key(&mut out, "StandardOutPath");
        plist_string(&mut out, 4, &log_path(self.stdout.as_ref()));
        plist_key(&mut out, "StandardErrorPath");
        plist_string(&mut out, 4, &log_path(self.stderr.as_ref()));

        out.push_str("  </dict>\n</plist>\n");
        out
    }
}

fn plist_key(out: &mut String, key: &str) {
    let _ = writeln!(out, "    <key>{key}</key>");
}

fn plist_string(out: &mut String, indent: usize, value: &str) {
    let _ = writeln!(out, "{:indent$}<string>{}</string>", "", xml_escape(value));
}

fn log_path(path: Option<&PathBuf>) -> String {
    path.map_or_else(|| DEV_NULL.to_string(), |p| p.display().to_string())
}

fn systemd_output(path: Option<&Path>) -> String {
    match path {
        Some(p) => format!("append:{}", p.display()),
        None => "null".to_string(),
    }
}

/// Double-quote a word for a unit file when it contains whitespace or quotes.
fn systemd_quote(word: &str) -> String {
    if !word.is_empty() && !word.contains(|c: char| c.is_whitespace() || c == '"' || c == '\\') {
        return word.to_string();
    }
    let mut quoted = String::with_capacity(word.len() + 2);
    quoted.push('"');
    for c in word.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting() {
        assert_eq!(systemd_quote("plain"), "plain");
        assert_eq!(systemd_quote("-Xss200000 -Xmx1g"), "\"-Xss200000 -Xmx1g\"");
        assert_eq!(systemd_quote("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(xml_escape("a<b & c>"), "a&lt;b &amp; c&gt;");
    }
}
