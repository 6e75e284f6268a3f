use std::net::IpAddr;
use std::net::Ipv4Addr;
use url::Url;

pub const fn server_listen_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

pub const fn server_port() -> u16 {
    8080
}

pub const fn server_port_tls() -> u16 {
    8443
}

pub fn beds24_api_url() -> Url {
    Url::parse("https://api.beds24.com/json/").expect("default Beds24 URL is valid")
}
