use std::path::Path;

/// Renders the minimal torrc this supervisor needs. Anything beyond
/// SOCKS/control/cookie/data-dir/logging is out of scope; operators who
/// need more write their own daemon wrapper.
pub fn render(socks_port: u16, control_port: u16, data_dir: &Path) -> String {
    format!(
        "SOCKSPort {socks_port}\n\
         ControlPort {control_port}\n\
         CookieAuthentication 1\n\
         CookieAuthFile {}\n\
         DataDirectory {}\n\
         Log notice stdout\n\
         SafeLogging 0\n",
        data_dir.join("control_auth_cookie").display(),
        data_dir.display(),
    )
}

pub async fn write(data_dir: &Path, socks_port: u16, control_port: u16) -> std::io::Result<std::path::PathBuf> {
    let path = data_dir.join("torrc");
    tokio::fs::write(&path, render(socks_port, control_port, data_dir)).await?;
    Ok(path)
}
