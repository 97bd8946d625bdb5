use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::dns_cache::DNSCache;
use crate::dns_msg::DNSMessage;
use crate::error::DnsError;

/// Carries one query to the upstream resolver and waits for its reply.
pub trait Upstream {
    fn forward(&self, query: &[u8]) -> Result<Bytes, DnsError>;
}

/// Answers queries from the cache, forwarding misses upstream.
pub struct Resolver<U> {
    cache: Arc<DNSCache>,
    upstream: U,
}

impl<U: Upstream> Resolver<U> {
    pub fn new(cache: Arc<DNSCache>, upstream: U) -> Self {
        Resolver { cache, upstream }
    }

    pub fn cache(&self) -> &DNSCache {
        &self.cache
    }

    /// Resolves one raw query into the raw response for the client.
    ///
    /// Only the first question is looked at. An error means the exchange is
    /// abandoned and nothing should be sent back.
    pub fn resolve(&self, packet: &[u8]) -> Result<Bytes, DnsError> {
        let request = DNSMessage::from_bytes(packet)?;
        let question = request.questions.first().ok_or(DnsError::NoQuestion)?;
        debug!(header = %request.header, question = %question, "decoded query");

        if let Some(record) = self.cache.lookup(question) {
            info!(question = %question, "cache hit");
            return Ok(DNSMessage::response(&request, vec![record]).to_bytes());
        }

        info!(question = %question, "cache miss, forwarding upstream");
        let reply = self.upstream.forward(&request.to_bytes())?;
        let reply = DNSMessage::from_bytes(&reply)?;
        debug!(header = %reply.header, "decoded upstream reply");

        // only the first answer is kept
        if let Some(answer) = reply.answers.first() {
            debug!(question = %question, ttl = answer.ttl, "caching answer");
            self.cache.insert(question.clone(), answer.clone());
        }

        Ok(reply.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io;
    use std::net::Ipv4Addr;

    use super::*;
    use crate::config::DEFAULT_UPSTREAM;
    use crate::dns_hdr::{DNSHdr, Flags};
    use crate::dns_msg::{Query, RRClass, RRType, Record};

    /// Replies with the configured answers, or times out for unknown names.
    #[derive(Default)]
    struct MockUpstream {
        answers: HashMap<String, Vec<Record>>,
        sent: RefCell<Vec<Bytes>>,
    }

    impl MockUpstream {
        fn with_answers(name: &str, answers: Vec<Record>) -> Self {
            MockUpstream {
                answers: HashMap::from([(name.to_string(), answers)]),
                ..Default::default()
            }
        }
    }

    impl Upstream for MockUpstream {
        fn forward(&self, query: &[u8]) -> Result<Bytes, DnsError> {
            self.sent.borrow_mut().push(Bytes::copy_from_slice(query));

            let request = DNSMessage::from_bytes(query)?;
            let domain = request.questions[0].name.to_string();
            match self.answers.get(&domain) {
                Some(answers) => {
                    Ok(DNSMessage::response(&request, answers.clone()).to_bytes())
                }
                None => Err(DnsError::Upstream {
                    addr: DEFAULT_UPSTREAM,
                    source: io::Error::from(io::ErrorKind::TimedOut),
                }),
            }
        }
    }

    fn query(id: u16, name: &str) -> Bytes {
        DNSMessage {
            header: DNSHdr {
                id,
                flags: Flags {
                    rd: true,
                    ..Default::default()
                },
                ..Default::default()
            },
            questions: vec![question(name)],
            ..Default::default()
        }
        .to_bytes()
    }

    fn question(name: &str) -> Query {
        Query::new(name.parse().unwrap(), RRType::A as u16, RRClass::IN as u16)
    }

    fn a_record(name: &str, ttl: u32, addr: Ipv4Addr) -> Record {
        Record::new(
            name.parse().unwrap(),
            RRType::A as u16,
            RRClass::IN as u16,
            ttl,
            addr.octets().to_vec(),
        )
    }

    fn example_answer() -> Record {
        a_record("example.com", 300, Ipv4Addr::new(93, 184, 216, 34))
    }

    fn resolver(upstream: MockUpstream) -> Resolver<MockUpstream> {
        Resolver::new(Arc::new(DNSCache::new()), upstream)
    }

    #[test]
    fn test_miss_forwards_and_caches() {
        let resolver = resolver(MockUpstream::with_answers(
            "example.com",
            vec![example_answer()],
        ));
        let packet = query(0xbeef, "example.com");

        let reply = DNSMessage::from_bytes(&resolver.resolve(&packet).unwrap()).unwrap();

        assert_eq!(resolver.upstream.sent.borrow().as_slice(), &[packet]);
        assert!(reply.header.flags.qr);
        assert_eq!(reply.header.id, 0xbeef);
        assert_eq!(reply.header.ancount, 1);
        assert_eq!(reply.answers, vec![example_answer()]);
        assert_eq!(
            resolver.cache().lookup(&question("example.com")),
            Some(example_answer())
        );
    }

    #[test]
    fn test_hit_skips_upstream() {
        let resolver = resolver(MockUpstream::with_answers(
            "example.com",
            vec![example_answer()],
        ));

        resolver.resolve(&query(1, "example.com")).unwrap();
        let reply = resolver.resolve(&query(2, "example.com")).unwrap();
        let reply = DNSMessage::from_bytes(&reply).unwrap();

        assert_eq!(resolver.upstream.sent.borrow().len(), 1);
        assert_eq!(reply.header.id, 2);
        assert!(reply.header.flags.qr);
        assert!(reply.header.flags.ra);
        assert!(reply.header.flags.rd);
        assert_eq!(reply.header.ancount, 1);
        assert_eq!(reply.questions, vec![question("example.com")]);
        assert_eq!(reply.answers, vec![example_answer()]);
    }

    #[test]
    fn test_upstream_failure_drops_exchange() {
        let resolver = resolver(MockUpstream::with_answers(
            "example.com",
            vec![example_answer()],
        ));

        let err = resolver.resolve(&query(1, "slow.example.net")).unwrap_err();
        assert!(matches!(err, DnsError::Upstream { .. }));
        assert!(!err.is_malformed());
        assert!(resolver.cache().is_empty());

        let reply = resolver.resolve(&query(2, "example.com")).unwrap();
        assert_eq!(DNSMessage::from_bytes(&reply).unwrap().answers.len(), 1);
    }

    #[test]
    fn test_only_first_answer_is_cached() {
        let second = a_record("example.com", 300, Ipv4Addr::new(93, 184, 216, 35));
        let resolver = resolver(MockUpstream::with_answers(
            "example.com",
            vec![example_answer(), second],
        ));

        let first = resolver.resolve(&query(1, "example.com")).unwrap();
        assert_eq!(DNSMessage::from_bytes(&first).unwrap().answers.len(), 2);

        let cached = resolver.resolve(&query(2, "example.com")).unwrap();
        assert_eq!(
            DNSMessage::from_bytes(&cached).unwrap().answers,
            vec![example_answer()]
        );
    }

    #[test]
    fn test_empty_answer_is_relayed_not_cached() {
        let resolver = resolver(MockUpstream::with_answers("nothing.example", vec![]));

        let reply = resolver.resolve(&query(5, "nothing.example")).unwrap();

        assert_eq!(DNSMessage::from_bytes(&reply).unwrap().header.ancount, 0);
        assert!(resolver.cache().is_empty());
        resolver.resolve(&query(6, "nothing.example")).unwrap();
        assert_eq!(resolver.upstream.sent.borrow().len(), 2);
    }

    #[test]
    fn test_expired_entry_is_refetched() {
        let resolver = resolver(MockUpstream::with_answers(
            "example.com",
            vec![example_answer()],
        ));
        resolver.cache().insert(
            question("example.com"),
            a_record("example.com", 0, Ipv4Addr::new(10, 0, 0, 1)),
        );

        let reply = resolver.resolve(&query(1, "example.com")).unwrap();

        assert_eq!(resolver.upstream.sent.borrow().len(), 1);
        assert_eq!(
            DNSMessage::from_bytes(&reply).unwrap().answers,
            vec![example_answer()]
        );
    }

    #[test]
    fn test_malformed_query_is_dropped() {
        let resolver = resolver(MockUpstream::default());
        let packet = query(1, "example.com");

        let err = resolver.resolve(&packet[..packet.len() - 3]).unwrap_err();

        assert!(matches!(err, DnsError::Truncated { .. }));
        assert!(err.is_malformed());
        assert!(resolver.upstream.sent.borrow().is_empty());
    }

    #[test]
    fn test_query_without_question_is_dropped() {
        let resolver = resolver(MockUpstream::default());
        let packet = DNSMessage::default().to_bytes();

        assert!(matches!(
            resolver.resolve(&packet),
            Err(DnsError::NoQuestion)
        ));
        assert!(resolver.upstream.sent.borrow().is_empty());
    }
}
