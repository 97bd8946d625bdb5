/*
                                1  1  1  1  1  1
  0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                      ID                       |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                    QDCOUNT                    |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                    ANCOUNT                    |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                    NSCOUNT                    |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
|                    ARCOUNT                    |
+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
 */

use std::fmt;

use bytes::{BufMut, BytesMut};
use nom::{bits::complete::take, combinator::map, number::complete::be_u16, sequence::tuple};

pub const DNS_HDR_SIZE: usize = 12;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: u8,
    pub rcode: u8,
}

impl Flags {
    pub fn compress_u16(&self) -> u16 {
        let flags_h: u8 = (u8::from(self.qr) << 7)
            | ((self.opcode & 0x0f) << 3)
            | (u8::from(self.aa) << 2)
            | (u8::from(self.tc) << 1)
            | u8::from(self.rd);
        let flags_l: u8 = (u8::from(self.ra) << 7) | ((self.z & 0x07) << 4) | (self.rcode & 0x0f);

        (flags_h as u16) << 8 | (flags_l as u16)
    }

    fn parse_flags<'a>(input: (&'a [u8], usize)) -> nom::IResult<(&'a [u8], usize), Flags> {
        map(
            tuple((
                take(1u8),
                take(4u8),
                take(1u8),
                take(1u8),
                take(1u8),
                take(1u8),
                take(3u8),
                take(4u8),
            )),
            |(qr, opcode, aa, tc, rd, ra, z, rcode): (u8, u8, u8, u8, u8, u8, u8, u8)| Flags {
                qr: qr == 1,
                opcode,
                aa: aa == 1,
                tc: tc == 1,
                rd: rd == 1,
                ra: ra == 1,
                z,
                rcode,
            },
        )(input)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DNSHdr {
    pub id: u16,
    pub flags: Flags,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl DNSHdr {
    /// Header answering `request`: a recursive, non-authoritative NOERROR
    /// reply echoing one question.
    pub fn response_to(request: &DNSHdr, ancount: u16, arcount: u16) -> Self {
        DNSHdr {
            id: request.id,
            flags: Flags {
                qr: true,
                opcode: request.flags.opcode,
                aa: false,
                tc: false,
                rd: request.flags.rd,
                ra: true,
                z: 0,
                rcode: 0,
            },
            qdcount: 1,
            ancount,
            nscount: 0,
            arcount,
        }
    }

    pub fn write(&self, buf: &mut BytesMut) {
        buf.put_u16(self.id);
        buf.put_u16(self.flags.compress_u16());
        buf.put_u16(self.qdcount);
        buf.put_u16(self.ancount);
        buf.put_u16(self.nscount);
        buf.put_u16(self.arcount);
    }

    pub fn parse(buf: &[u8]) -> nom::IResult<&[u8], Self> {
        map(
            tuple((
                be_u16,
                nom::bits::bits(Flags::parse_flags),
                be_u16,
                be_u16,
                be_u16,
                be_u16,
            )),
            |(id, flags, qdcount, ancount, nscount, arcount)| DNSHdr {
                id,
                flags,
                qdcount,
                ancount,
                nscount,
                arcount,
            },
        )(buf)
    }
}

impl fmt::Display for DNSHdr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={} opcode={} rcode={} qd={} an={} ns={} ar={}",
            self.id,
            self.flags.opcode,
            self.flags.rcode,
            self.qdcount,
            self.ancount,
            self.nscount,
            self.arcount
        )
    }
}
