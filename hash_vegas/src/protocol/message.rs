use std::{fmt, io::Cursor};

use bytes::{BufMut, Bytes, BytesMut};

use super::{get_bytes, get_string, get_u8, put_bytes, Parse};
use crate::{error::FrameError, family::Family};

/// Client to oracle
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Issue { user: String },
    Redeem { data: Bytes, digest: Bytes },
}

/// Oracle to client
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    Voucher {
        data: Bytes,
        digest: Bytes,
        family: Option<Family>,
    },
    Accepted {
        reward: Bytes,
    },
    Rejected {
        reason: String,
    },
    Error {
        message: String,
    },
}

impl Parse for Request {
    fn check(src: &mut Cursor<&[u8]>) -> Result<(), FrameError> {
        match get_u8(src)? {
            b'i' => get_string(src).map(|_| ()),
            b'r' => {
                get_bytes(src)?;
                get_bytes(src).map(|_| ())
            }
            other => Err(FrameError::UnknownMessage(other)),
        }
    }

    fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, FrameError> {
        match get_u8(src)? {
            b'i' => Ok(Self::Issue {
                user: get_string(src)?,
            }),
            b'r' => {
                let data = Bytes::copy_from_slice(get_bytes(src)?);
                let digest = Bytes::copy_from_slice(get_bytes(src)?);
                Ok(Self::Redeem { data, digest })
            }
            other => Err(FrameError::UnknownMessage(other)),
        }
    }

    fn encode(&self, dst: &mut BytesMut) {
        match self {
            Self::Issue { user } => {
                dst.put_u8(b'i');
                put_bytes(dst, user.as_bytes());
            }
            Self::Redeem { data, digest } => {
                dst.put_u8(b'r');
                put_bytes(dst, data);
                put_bytes(dst, digest);
            }
        }
    }
}

fn get_family(src: &mut Cursor<&[u8]>) -> Result<Option<Family>, FrameError> {
    match get_u8(src)? {
        0 => Ok(None),
        tag => Family::from_wire_tag(tag)
            .map(Some)
            .ok_or(FrameError::UnknownFamily(tag)),
    }
}

impl Parse for Response {
    fn check(src: &mut Cursor<&[u8]>) -> Result<(), FrameError> {
        match get_u8(src)? {
            b'v' => {
                get_bytes(src)?;
                get_bytes(src)?;
                get_family(src).map(|_| ())
            }
            b'+' => get_bytes(src).map(|_| ()),
            b'-' | b'e' => get_string(src).map(|_| ()),
            other => Err(FrameError::UnknownMessage(other)),
        }
    }

    fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, FrameError> {
        match get_u8(src)? {
            b'v' => {
                let data = Bytes::copy_from_slice(get_bytes(src)?);
                let digest = Bytes::copy_from_slice(get_bytes(src)?);
                let family = get_family(src)?;
                Ok(Self::Voucher {
                    data,
                    digest,
                    family,
                })
            }
            b'+' => Ok(Self::Accepted {
                reward: Bytes::copy_from_slice(get_bytes(src)?),
            }),
            b'-' => Ok(Self::Rejected {
                reason: get_string(src)?,
            }),
            b'e' => Ok(Self::Error {
                message: get_string(src)?,
            }),
            other => Err(FrameError::UnknownMessage(other)),
        }
    }

    fn encode(&self, dst: &mut BytesMut) {
        match self {
            Self::Voucher {
                data,
                digest,
                family,
            } => {
                dst.put_u8(b'v');
                put_bytes(dst, data);
                put_bytes(dst, digest);
                dst.put_u8(family.map_or(0, Family::wire_tag));
            }
            Self::Accepted { reward } => {
                dst.put_u8(b'+');
                put_bytes(dst, reward);
            }
            Self::Rejected { reason } => {
                dst.put_u8(b'-');
                put_bytes(dst, reason.as_bytes());
            }
            Self::Error { message } => {
                dst.put_u8(b'e');
                put_bytes(dst, message.as_bytes());
            }
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Voucher { family, .. } => match family {
                Some(family) => write!(f, "voucher ({family})"),
                None => f.write_str("voucher"),
            },
            Self::Accepted { .. } => f.write_str("accepted"),
            Self::Rejected { reason } => write!(f, "rejected: {reason}"),
            Self::Error { message } => write!(f, "error: {message}"),
        }
    }
}

#[test]
fn test_partial_frames_are_incomplete() {
    let mut frame = BytesMut::new();
    Response::Voucher {
        data: Bytes::from_static(b"guest|100"),
        digest: Bytes::from_static(&[7; 20]),
        family: Some(Family::Sha1),
    }
    .encode(&mut frame);

    for cut in 0..frame.len() {
        let mut cursor = Cursor::new(&frame[..cut]);
        assert!(matches!(Response::check(&mut cursor), Err(FrameError::Incomplete)), "cut {cut}");
    }

    let mut cursor = Cursor::new(&frame[..]);
    Response::check(&mut cursor).unwrap();
    assert_eq!(cursor.position() as usize, frame.len());
}

#[test]
fn test_malformed_frames() {
    let mut cursor = Cursor::new(&b"?"[..]);
    assert!(matches!(Request::check(&mut cursor), Err(FrameError::UnknownMessage(b'?'))));

    let mut frame = BytesMut::new();
    frame.put_u8(b'v');
    put_bytes(&mut frame, b"d");
    put_bytes(&mut frame, b"h");
    frame.put_u8(42);
    let mut cursor = Cursor::new(&frame[..]);
    assert!(matches!(Response::check(&mut cursor), Err(FrameError::UnknownFamily(42))));

    let mut frame = BytesMut::new();
    frame.put_u8(b'r');
    frame.put_u32(u32::MAX);
    let mut cursor = Cursor::new(&frame[..]);
    assert!(matches!(Request::check(&mut cursor), Err(FrameError::Oversized(_))));
}

#[tokio::test]
async fn test_connection_exchanges_frames() {
    use super::Connection;

    let (client, server) = tokio::io::duplex(4096);
    let mut client = Connection::new(client);
    let mut server = Connection::new(server);

    let redeem = Request::Redeem {
        data: Bytes::from(vec![0x80; 300]),
        digest: Bytes::from_static(&[1; 32]),
    };
    client.write_frame(&redeem).await.unwrap();
    client
        .write_frame(&Request::Issue { user: "guest".into() })
        .await
        .unwrap();

    assert_eq!(server.read_frame::<Request>().await.unwrap(), Some(redeem));
    assert_eq!(
        server.read_frame::<Request>().await.unwrap(),
        Some(Request::Issue { user: "guest".into() })
    );

    drop(client);
    assert_eq!(server.read_frame::<Request>().await.unwrap(), None);
}
