use std::fmt;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use nom::{
    combinator::map,
    multi::{count, length_data},
    number::complete::{be_u16, be_u32},
    sequence::tuple,
};

use crate::config::MAX_PACKET_SIZE;
use crate::dns_hdr::{DNSHdr, DNS_HDR_SIZE};
use crate::dns_name::{parse_name, CompressionTable, Name};
use crate::error::DnsError;

/// TTLs with the high bit set are treated as zero (RFC 2181, section 8).
const MAX_TTL: u32 = i32::MAX as u32;

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RRType {
    A = 1, // Host Address
    NS = 2, // an authoritative name server
    CNAME = 5, // the canonical name for an alias
    SOA = 6, // marks the start of a zone of authority
    PTR = 12, // a domain name pointer
    MX = 15, // mail exchange
    TXT = 16, // text strings
    AAAA = 28, // IPv6 host address
}

impl RRType {
    pub fn from_u16(code: u16) -> Option<Self> {
        Some(match code {
            1 => RRType::A,
            2 => RRType::NS,
            5 => RRType::CNAME,
            6 => RRType::SOA,
            12 => RRType::PTR,
            15 => RRType::MX,
            16 => RRType::TXT,
            28 => RRType::AAAA,
            _ => return None,
        })
    }
}

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RRClass {
    IN = 1, // the Internet
    CS = 2, // the CSNET class (Obsolete - used only for examples in some obsolete RFCs)
    CH = 3, // the CHAOS class
    HS = 4, // Hesiod [Dyer 87]
}

impl RRClass {
    pub fn from_u16(code: u16) -> Option<Self> {
        Some(match code {
            1 => RRClass::IN,
            2 => RRClass::CS,
            3 => RRClass::CH,
            4 => RRClass::HS,
            _ => return None,
        })
    }
}

/*
                                1  1  1  1  1  1
  0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                                               |
/                     QNAME                     /
/                                               /
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                     QTYPE                     |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                     QCLASS                    |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
*/
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    pub name: Name,
    pub qtype: u16,
    pub qclass: u16,
}

impl Query {
    pub fn new(name: Name, qtype: u16, qclass: u16) -> Self {
        Query {
            name,
            qtype,
            qclass,
        }
    }

    pub fn parser<'a>(msg: &'a [u8]) -> impl FnMut(&'a [u8]) -> nom::IResult<&'a [u8], Self> {
        map(
            tuple((parse_name(msg), be_u16, be_u16)),
            |(name, qtype, qclass)| Query {
                name,
                qtype,
                qclass,
            },
        )
    }

    pub fn write(&self, buf: &mut BytesMut, names: &mut CompressionTable) {
        self.name.write(buf, names);
        buf.put_u16(self.qtype);
        buf.put_u16(self.qclass);
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.name)?;
        match RRType::from_u16(self.qtype) {
            Some(t) => write!(f, "{t:?} ")?,
            None => write!(f, "TYPE{} ", self.qtype)?,
        }
        match RRClass::from_u16(self.qclass) {
            Some(c) => write!(f, "{c:?}"),
            None => write!(f, "CLASS{}", self.qclass),
        }
    }
}

/*
                                1  1  1  1  1  1
  0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                                               |
/                                               /
/                      NAME                     /
|                                               |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                      TYPE                     |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                     CLASS                     |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                      TTL                      |
|                                               |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                   RDLENGTH                    |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--|
/                     RDATA                     /
/                                               /
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: Name,
    pub rtype: u16,
    pub rclass: u16,
    pub ttl: u32,
    pub rdata: Bytes,
}

impl Record {
    pub fn new(name: Name, rtype: u16, rclass: u16, ttl: u32, rdata: impl Into<Bytes>) -> Self {
        Record {
            name,
            rtype,
            rclass,
            ttl,
            rdata: rdata.into(),
        }
    }

    pub fn parser<'a>(msg: &'a [u8]) -> impl FnMut(&'a [u8]) -> nom::IResult<&'a [u8], Self> {
        map(
            tuple((
                parse_name(msg),
                be_u16,
                be_u16,
                be_u32,
                length_data(be_u16),
            )),
            |(name, rtype, rclass, ttl, rdata)| Record {
                name,
                rtype,
                rclass,
                ttl,
                rdata: Bytes::copy_from_slice(rdata),
            },
        )
    }

    pub fn write(&self, buf: &mut BytesMut, names: &mut CompressionTable) {
        self.name.write(buf, names);
        buf.put_u16(self.rtype);
        buf.put_u16(self.rclass);
        buf.put_u32(self.ttl);
        buf.put_u16(self.rdata.len() as u16);
        buf.extend_from_slice(&self.rdata);
    }

    /// How long the record stays valid after it was cached.
    pub fn lifetime(&self) -> Duration {
        if self.ttl > MAX_TTL {
            Duration::ZERO
        } else {
            Duration::from_secs(u64::from(self.ttl))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DNSMessage {
    pub header: DNSHdr,
    pub questions: Vec<Query>,
    pub answers: Vec<Record>,
    pub authorities: Vec<Record>,
    pub additionals: Vec<Record>,
}

impl DNSMessage {
    /// Builds the reply to `request` carrying `answers`, echoing the
    /// request's questions and additional records.
    pub fn response(request: &DNSMessage, answers: Vec<Record>) -> Self {
        DNSMessage {
            header: DNSHdr::response_to(
                &request.header,
                answers.len() as u16,
                request.additionals.len() as u16,
            ),
            questions: request.questions.clone(),
            answers,
            authorities: vec![],
            additionals: request.additionals.clone(),
        }
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, DnsError> {
        if buf.len() < DNS_HDR_SIZE {
            return Err(DnsError::Truncated { offset: buf.len() });
        }

        Self::parse(buf)
            .map(|(_, message)| message)
            .map_err(|e| DnsError::from_nom(buf, e))
    }

    fn parse(buf: &[u8]) -> nom::IResult<&[u8], Self> {
        let (rest, header) = DNSHdr::parse(buf)?;
        let (rest, questions) = count(Query::parser(buf), header.qdcount.into())(rest)?;
        let (rest, answers) = count(Record::parser(buf), header.ancount.into())(rest)?;
        let (rest, authorities) = count(Record::parser(buf), header.nscount.into())(rest)?;
        let (rest, additionals) = count(Record::parser(buf), header.arcount.into())(rest)?;

        Ok((
            rest,
            DNSMessage {
                header,
                questions,
                answers,
                authorities,
                additionals,
            },
        ))
    }

    /// Encodes the message. Section counts are taken from the sections
    /// themselves and one compression table spans the whole message.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(MAX_PACKET_SIZE);
        let mut names = CompressionTable::new();

        let header = DNSHdr {
            qdcount: self.questions.len() as u16,
            ancount: self.answers.len() as u16,
            nscount: self.authorities.len() as u16,
            arcount: self.additionals.len() as u16,
            ..self.header
        };
        header.write(&mut buf);

        for q in self.questions.iter() {
            q.write(&mut buf, &mut names);
        }

        for r in self
            .answers
            .iter()
            .chain(self.authorities.iter())
            .chain(self.additionals.iter())
        {
            r.write(&mut buf, &mut names);
        }

        buf.freeze()
    }
}
