//! Synchronous rtnetlink helpers for link, address and route inspection.
//!
//! Each operation opens its own netlink connection inside a current-thread
//! tokio runtime, so the crate's public surface stays synchronous and a call
//! made inside a network namespace binds its socket to that namespace.

use std::net::Ipv4Addr;

use futures_util::TryStreamExt;
use netlink_packet_route::address::AddressAttribute;
use netlink_packet_route::link::{LinkAttribute, LinkMessage};
use netlink_packet_route::route::{RouteAddress, RouteAttribute};
use netlink_packet_route::AddressFamily;
use rtnetlink::{Handle, IpVersion};

use crate::error::Error;

/// A network interface as seen through netlink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub index: u32,
    pub name: String,
    pub mac: Option<String>,
    pub mtu: Option<u32>,
}

/// An IPv4 address assigned to a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    pub address: Ipv4Addr,
    pub prefix_len: u8,
}

/// An IPv4 route whose output interface is the inspected link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    /// Destination network; `None` is the default route.
    pub destination: Option<(Ipv4Addr, u8)>,
    pub gateway: Option<Ipv4Addr>,
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, Error> {
    tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .map_err(Error::Io)
}

async fn connect() -> Result<Handle, Error> {
    let (connection, handle, _) = rtnetlink::new_connection().map_err(Error::Io)?;
    tokio::spawn(connection);
    Ok(handle)
}

fn netlink_err(e: rtnetlink::Error) -> Error {
    Error::Netlink(e.to_string())
}

fn link_from_message(msg: LinkMessage) -> Link {
    let mut link = Link {
        index: msg.header.index,
        name: String::new(),
        mac: None,
        mtu: None,
    };
    for attr in msg.attributes {
        match attr {
            LinkAttribute::IfName(name) => link.name = name,
            LinkAttribute::Address(bytes) => {
                link.mac = Some(
                    bytes
                        .iter()
                        .map(|b| format!("{b:02x}"))
                        .collect::<Vec<_>>()
                        .join(":"),
                );
            }
            LinkAttribute::Mtu(mtu) => link.mtu = Some(mtu),
            _ => {}
        }
    }
    link
}

/// Looks up a link by name in the active namespace.
///
/// # Errors
///
/// [`Error::LinkNotFound`] when no such link exists.
pub fn link_by_name(name: &str) -> Result<Link, Error> {
    runtime()?.block_on(async {
        let handle = connect().await?;
        let mut links = handle.link().get().match_name(name.to_string()).execute();
        match links.try_next().await {
            Ok(Some(msg)) => Ok(link_from_message(msg)),
            Ok(None) => Err(Error::LinkNotFound(name.to_string())),
            Err(e) => Err(Error::LinkNotFound(format!("{name}: {e}"))),
        }
    })
}

/// Brings the named link administratively up.
pub fn set_link_up(name: &str) -> Result<(), Error> {
    let link = link_by_name(name)?;
    runtime()?.block_on(async {
        let handle = connect().await?;
        handle
            .link()
            .set(link.index)
            .up()
            .execute()
            .await
            .map_err(netlink_err)
    })
}

/// Deletes the named link. Deleting one end of a veth pair removes both.
pub fn del_link(name: &str) -> Result<(), Error> {
    let link = link_by_name(name)?;
    runtime()?.block_on(async {
        let handle = connect().await?;
        handle
            .link()
            .del(link.index)
            .execute()
            .await
            .map_err(netlink_err)
    })
}

/// Creates a veth pair and applies `mtu` to the first-named side.
pub fn create_veth(name: &str, peer: &str, mtu: u32) -> Result<(), Error> {
    runtime()?.block_on(async {
        let handle = connect().await?;
        handle
            .link()
            .add()
            .veth(name.to_string(), peer.to_string())
            .execute()
            .await
            .map_err(netlink_err)?;

        let mut links = handle.link().get().match_name(name.to_string()).execute();
        let msg = links
            .try_next()
            .await
            .map_err(netlink_err)?
            .ok_or_else(|| Error::LinkNotFound(name.to_string()))?;
        handle
            .link()
            .set(msg.header.index)
            .mtu(mtu)
            .execute()
            .await
            .map_err(netlink_err)
    })
}

/// Lists the IPv4 addresses assigned to `link`.
pub fn addr_list_v4(link: &Link) -> Result<Vec<Address>, Error> {
    runtime()?.block_on(async {
        let handle = connect().await?;
        let mut addrs = handle
            .address()
            .get()
            .set_link_index_filter(link.index)
            .execute();
        let mut out = Vec::new();
        while let Some(msg) = addrs.try_next().await.map_err(netlink_err)? {
            if msg.header.family != AddressFamily::Inet {
                continue;
            }
            let prefix_len = msg.header.prefix_len;
            for attr in msg.attributes {
                if let AddressAttribute::Address(std::net::IpAddr::V4(addr)) = attr {
                    out.push(Address {
                        address: addr,
                        prefix_len,
                    });
                }
            }
        }
        Ok(out)
    })
}

/// Lists the IPv4 routes leaving through `link`.
pub fn route_list_v4(link: &Link) -> Result<Vec<RouteEntry>, Error> {
    runtime()?.block_on(async {
        let handle = connect().await?;
        let mut routes = handle.route().get(IpVersion::V4).execute();
        let mut out = Vec::new();
        while let Some(msg) = routes.try_next().await.map_err(netlink_err)? {
            let mut oif = None;
            let mut destination = None;
            let mut gateway = None;
            for attr in &msg.attributes {
                match attr {
                    RouteAttribute::Oif(index) => oif = Some(*index),
                    RouteAttribute::Destination(RouteAddress::Inet(addr)) => {
                        destination = Some((*addr, msg.header.destination_prefix_length));
                    }
                    RouteAttribute::Gateway(RouteAddress::Inet(addr)) => gateway = Some(*addr),
                    _ => {}
                }
            }
            if oif == Some(link.index) {
                out.push(RouteEntry {
                    destination,
                    gateway,
                });
            }
        }
        Ok(out)
    })
}
