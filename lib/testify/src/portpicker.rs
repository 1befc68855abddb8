use std::net::{IpAddr, SocketAddr, TcpListener};

use rand::Rng;

pub type Port = u16;

fn is_free_tcp(ip: IpAddr, port: Port) -> bool {
    TcpListener::bind(SocketAddr::new(ip, port)).is_ok()
}

/// Asks the OS for a free port
fn ask_free_tcp_port(ip: IpAddr) -> Option<Port> {
    Some(
        TcpListener::bind(SocketAddr::new(ip, 0))
            .ok()?
            .local_addr()
            .ok()?
            .port(),
    )
}

/// Picks a TCP port which nobody listens on right now. A random port in
/// the range 15000..25000 is tried first, then the OS is asked for one.
pub fn pick_unused_port(ip: IpAddr) -> Port {
    let mut rng = rand::rng();

    loop {
        for _ in 0..10 {
            let port = rng.random_range(15000..25000);
            if is_free_tcp(ip, port) {
                return port;
            }
        }

        if let Some(port) = ask_free_tcp_port(ip) {
            return port;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn ipv4_localhost() {
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let port = pick_unused_port(ip);

        assert!(is_free_tcp(ip, port));
    }
}
