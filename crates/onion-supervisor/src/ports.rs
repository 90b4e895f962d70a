use std::net::TcpListener;

/// Binds to port 0 to let the OS pick a free loopback port, then releases
/// it immediately. There is a race between release and the caller's bind,
/// but it is the same approach the daemon's own ephemeral-port allocation
/// accepts.
pub fn allocate_free_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Allocates two distinct non-zero ports; retries once on collision,
/// which is astronomically rare but cheap to guard against.
pub fn allocate_distinct_pair() -> std::io::Result<(u16, u16)> {
    let a = allocate_free_port()?;
    let mut b = allocate_free_port()?;
    if b == a {
        b = allocate_free_port()?;
    }
    Ok((a, b))
}
