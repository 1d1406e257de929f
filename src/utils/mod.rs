use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

const SSH_PORT: u16 = 22;

/// Keyboard-interactive prompt handler that answers every prompt with the password
struct PasswordPrompt {
    password: String,
}

impl ssh2::KeyboardInteractivePrompt for PasswordPrompt {
    fn prompt<'a>(
        &mut self,
        _username: &str,
        _instructions: &str,
        prompts: &[ssh2::Prompt<'a>],
    ) -> Vec<String> {
        prompts.iter().map(|_| self.password.clone()).collect()
    }
}

/// Check that a device address is a plain hostname or IPv4 literal.
/// No path separators, whitespace or shell metacharacters.
pub fn is_valid_device_address(host: &str) -> bool {
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    host.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}

/// Open an authenticated SSH session to a fabric device.
/// Tries password auth, then keyboard-interactive (Junos commonly needs it).
/// This is blocking, so call from a spawn_blocking context.
pub fn ssh_connect(
    host: &str,
    user: &str,
    pass: &str,
    timeout_secs: u64,
) -> Result<ssh2::Session, String> {
    let timeout = Duration::from_secs(timeout_secs);
    let addr = (host, SSH_PORT)
        .to_socket_addrs()
        .map_err(|e| format!("Cannot resolve {}: {}", host, e))?
        .next()
        .ok_or_else(|| format!("No address found for {}", host))?;

    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| format!("TCP connection to {} failed: {}", addr, e))?;
    tcp.set_read_timeout(Some(timeout)).ok();
    tcp.set_write_timeout(Some(timeout)).ok();

    let mut session =
        ssh2::Session::new().map_err(|e| format!("Failed to create SSH session: {}", e))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(u32::try_from(timeout_secs.saturating_mul(1000)).unwrap_or(u32::MAX));
    session
        .handshake()
        .map_err(|e| format!("SSH handshake failed: {}", e))?;

    if session.userauth_password(user, pass).is_ok() && session.authenticated() {
        return Ok(session);
    }

    let mut prompter = PasswordPrompt {
        password: pass.to_string(),
    };
    let _ = session.userauth_keyboard_interactive(user, &mut prompter);

    if session.authenticated() {
        Ok(session)
    } else {
        Err(format!("SSH authentication failed for {}@{}", user, host))
    }
}

/// Run one CLI command on an open session and return its output.
/// Junos reports bad commands in-band, so an `error:` prefix is treated as failure.
pub fn ssh_exec(session: &ssh2::Session, command: &str) -> Result<String, String> {
    let mut channel = session
        .channel_session()
        .map_err(|e| format!("Failed to open channel: {}", e))?;
    channel
        .exec(command)
        .map_err(|e| format!("Failed to execute '{}': {}", command, e))?;

    let mut output = String::new();
    channel
        .read_to_string(&mut output)
        .map_err(|e| format!("Failed to read output of '{}': {}", command, e))?;
    let _ = channel.wait_close();

    if is_cli_error(&output) {
        return Err(format!("'{}' rejected: {}", command, first_line(&output)));
    }
    Ok(output)
}

fn is_cli_error(output: &str) -> bool {
    let head = output.trim_start();
    head.starts_with("error:") || head.starts_with("syntax error") || head.starts_with("unknown command")
}

/// First non-empty line of device output, for error messages
pub fn first_line(s: &str) -> &str {
    s.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
}
