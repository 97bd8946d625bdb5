use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use nom::{
    bytes::complete::take,
    error::{Error, ErrorKind},
    number::complete::be_u8,
};

use crate::error::DnsError;

const POINTER_TAG: u8 = 0b1100_0000;
const MAX_POINTER_OFFSET: usize = 0x3fff;
const MAX_POINTER_HOPS: usize = 32;
const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;

/// Offsets of the names already written into one outgoing message.
pub type CompressionTable = HashMap<Name, usize>;

/// A domain name as its sequence of raw labels, without the root label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Name {
    labels: Vec<Bytes>,
}

impl Name {
    pub fn root() -> Self {
        Name::default()
    }

    pub fn from_labels<I, L>(labels: I) -> Result<Self, DnsError>
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        let labels = labels
            .into_iter()
            .map(|l| Bytes::copy_from_slice(l.as_ref()))
            .collect::<Vec<_>>();

        let mut wire_len = 1;
        for label in &labels {
            wire_len += label.len() + 1;
            if label.is_empty() {
                return Err(DnsError::EmptyLabel(join_labels(&labels)));
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(DnsError::LabelTooLong(
                    String::from_utf8_lossy(label).into_owned(),
                ));
            }
        }
        if wire_len > MAX_NAME_LEN {
            return Err(DnsError::NameLengthExceeded(join_labels(&labels)));
        }

        Ok(Name { labels })
    }

    pub fn labels(&self) -> &[Bytes] {
        &self.labels
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Writes the name, or a pointer to an earlier copy of it recorded in `table`.
    pub fn write(&self, buf: &mut BytesMut, table: &mut CompressionTable) {
        if let Some(&offset) = table.get(self) {
            buf.put_u16(u16::from(POINTER_TAG) << 8 | offset as u16);
            return;
        }

        let offset = buf.len();
        if !self.is_root() && offset <= MAX_POINTER_OFFSET {
            table.insert(self.clone(), offset);
        }

        for label in &self.labels {
            buf.put_u8(label.len() as u8);
            buf.extend_from_slice(label);
        }
        buf.put_u8(0);
    }
}

fn join_labels(labels: &[Bytes]) -> String {
    labels
        .iter()
        .map(|l| String::from_utf8_lossy(l))
        .collect::<Vec<_>>()
        .join(".")
}

impl FromStr for Name {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_suffix('.').unwrap_or(s);
        if s.is_empty() {
            return Ok(Name::root());
        }
        Name::from_labels(s.split('.'))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        f.write_str(&join_labels(&self.labels))
    }
}

/// Parses a possibly compressed name. Pointers are resolved against `msg`,
/// which must be the whole message the parsed input is a suffix of.
///
/// A pointer has to point strictly backwards from where it sits and a name
/// may follow at most `MAX_POINTER_HOPS` of them, so hostile pointer chains
/// fail instead of looping.
pub fn parse_name<'a>(msg: &'a [u8]) -> impl FnMut(&'a [u8]) -> nom::IResult<&'a [u8], Name> {
    move |input: &'a [u8]| {
        let mut labels = Vec::new();
        let mut wire_len = 1;
        let mut cursor = input;
        let mut resume = None;
        let mut hops = 0;

        loop {
            let (rest, len) = be_u8(cursor)?;

            match len {
                0 => return Ok((resume.unwrap_or(rest), Name { labels })),
                len if len & POINTER_TAG == POINTER_TAG => {
                    let (rest, low) = be_u8(rest)?;
                    let target = usize::from(len & !POINTER_TAG) << 8 | usize::from(low);
                    let here = msg.len().saturating_sub(cursor.len());

                    if target >= here || hops == MAX_POINTER_HOPS {
                        return Err(nom::Err::Failure(Error::new(
                            cursor,
                            ErrorKind::Verify,
                        )));
                    }
                    hops += 1;
                    resume.get_or_insert(rest);
                    cursor = &msg[target..];
                }
                len if len & POINTER_TAG != 0 => {
                    return Err(nom::Err::Failure(Error::new(
                        cursor,
                        ErrorKind::LengthValue,
                    )));
                }
                len => {
                    let (rest, label) = take(len)(rest)?;
                    wire_len += label.len() + 1;
                    if wire_len > MAX_NAME_LEN {
                        return Err(nom::Err::Failure(Error::new(
                            cursor,
                            ErrorKind::TooLarge,
                        )));
                    }
                    labels.push(Bytes::copy_from_slice(label));
                    cursor = rest;
                }
            }
        }
    }
}
