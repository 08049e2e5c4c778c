//! DNS messages.

use crate::edns::Edns;
use crate::error::{Error, Result};
use crate::header::{Header, HEADER_SIZE};
use crate::question::Question;
use crate::record::ResourceRecord;
use crate::types::{RecordType, ResponseCode};
use bytes::BytesMut;

/// A complete DNS message.
///
/// The validator rebuilds message sections in place while pruning unverified
/// records; the replace/take mutators keep the header counts consistent so a
/// mutated message still serializes correctly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    header: Header,
    questions: Vec<Question>,
    answers: Vec<ResourceRecord>,
    authority: Vec<ResourceRecord>,
    additional: Vec<ResourceRecord>,
    edns: Option<Edns>,
}

impl Message {
    /// Creates an empty message with the given header.
    pub fn new(header: Header) -> Self {
        Self {
            header,
            questions: Vec::new(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
            edns: None,
        }
    }

    /// Creates a recursion-desired query carrying EDNS(0).
    pub fn query(question: Question) -> Self {
        let mut header = Header::query();
        header.qd_count = 1;
        Self {
            header,
            questions: vec![question],
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
            edns: Some(Edns::new()),
        }
    }

    /// Creates a query with the DNSSEC OK bit set.
    pub fn query_dnssec(question: Question) -> Self {
        let mut msg = Self::query(question);
        msg.edns = Some(Edns::with_dnssec_ok());
        msg
    }

    /// Creates an empty response mirroring a query.
    pub fn response_from(query: &Message) -> Self {
        let mut header = Header::response_from(&query.header);
        header.qd_count = query.questions.len() as u16;
        Self {
            header,
            questions: query.questions.clone(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
            edns: query.edns.clone(),
        }
    }

    /// The message header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Mutable access to the header.
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// The message id.
    pub fn id(&self) -> u16 {
        self.header.id
    }

    /// Sets the message id.
    pub fn set_id(&mut self, id: u16) {
        self.header.id = id;
    }

    /// The response code.
    pub fn rcode(&self) -> ResponseCode {
        self.header.rcode()
    }

    /// Sets the response code.
    pub fn set_rcode(&mut self, rcode: ResponseCode) {
        self.header.set_rcode(rcode);
    }

    /// The first question, if any.
    pub fn question(&self) -> Option<&Question> {
        self.questions.first()
    }

    /// All questions.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// The answer section.
    pub fn answers(&self) -> &[ResourceRecord] {
        &self.answers
    }

    /// The authority section.
    pub fn authority(&self) -> &[ResourceRecord] {
        &self.authority
    }

    /// The additional section, excluding the OPT pseudo-record.
    pub fn additional(&self) -> &[ResourceRecord] {
        &self.additional
    }

    /// The EDNS(0) state, if present.
    pub fn edns(&self) -> Option<&Edns> {
        self.edns.as_ref()
    }

    /// Sets the EDNS(0) state.
    pub fn set_edns(&mut self, edns: Option<Edns>) {
        self.edns = edns;
        self.sync_ar_count();
    }

    /// Appends an answer record.
    pub fn add_answer(&mut self, record: ResourceRecord) {
        self.answers.push(record);
        self.header.an_count = self.answers.len() as u16;
    }

    /// Appends an authority record.
    pub fn add_authority(&mut self, record: ResourceRecord) {
        self.authority.push(record);
        self.header.ns_count = self.authority.len() as u16;
    }

    /// Appends an additional record.
    pub fn add_additional(&mut self, record: ResourceRecord) {
        self.additional.push(record);
        self.sync_ar_count();
    }

    /// Replaces the answer section.
    pub fn set_answers(&mut self, records: Vec<ResourceRecord>) {
        self.answers = records;
        self.header.an_count = self.answers.len() as u16;
    }

    /// Replaces the authority section.
    pub fn set_authority(&mut self, records: Vec<ResourceRecord>) {
        self.authority = records;
        self.header.ns_count = self.authority.len() as u16;
    }

    /// Replaces the additional section.
    pub fn set_additional(&mut self, records: Vec<ResourceRecord>) {
        self.additional = records;
        self.sync_ar_count();
    }

    /// Takes all three record sections, leaving them empty.
    pub fn take_sections(
        &mut self,
    ) -> (
        Vec<ResourceRecord>,
        Vec<ResourceRecord>,
        Vec<ResourceRecord>,
    ) {
        let answers = std::mem::take(&mut self.answers);
        let authority = std::mem::take(&mut self.authority);
        let additional = std::mem::take(&mut self.additional);
        self.header.an_count = 0;
        self.header.ns_count = 0;
        self.sync_ar_count();
        (answers, authority, additional)
    }

    fn sync_ar_count(&mut self) {
        let edns = usize::from(self.edns.is_some());
        self.header.ar_count = (self.additional.len() + edns) as u16;
    }

    /// Returns true for an NXDOMAIN response.
    pub fn is_nxdomain(&self) -> bool {
        self.rcode() == ResponseCode::NXDomain
    }

    /// Returns true for a SERVFAIL response.
    pub fn is_servfail(&self) -> bool {
        self.rcode() == ResponseCode::ServFail
    }

    /// Returns true if the TC bit is set.
    pub fn is_truncated(&self) -> bool {
        self.header.is_truncated()
    }

    /// Returns true if the AD bit is set.
    pub fn authentic_data(&self) -> bool {
        self.header.authentic_data()
    }

    /// Parses a message from wire format.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = Header::parse(data)?;
        let mut offset = HEADER_SIZE;

        let mut questions = Vec::with_capacity(header.qd_count as usize);
        for _ in 0..header.qd_count {
            let (q, next) = Question::parse(data, offset)?;
            questions.push(q);
            offset = next;
        }

        let read_section = |count: u16, offset: &mut usize| -> Result<Vec<ResourceRecord>> {
            let mut records = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (rr, next) = ResourceRecord::parse(data, *offset)?;
                records.push(rr);
                *offset = next;
            }
            Ok(records)
        };

        let answers = read_section(header.an_count, &mut offset)?;
        let authority = read_section(header.ns_count, &mut offset)?;
        let raw_additional = read_section(header.ar_count, &mut offset)?;

        // Split the OPT pseudo-record out of the additional section.
        let mut additional = Vec::with_capacity(raw_additional.len());
        let mut edns = None;
        for rr in raw_additional {
            if rr.rtype() == RecordType::OPT {
                if edns.is_some() {
                    return Err(Error::invalid(offset, "duplicate OPT record"));
                }
                edns = Some(Edns::from_opt_fields(rr.class().to_u16(), rr.ttl()));
            } else {
                additional.push(rr);
            }
        }

        Ok(Self {
            header,
            questions,
            answers,
            authority,
            additional,
            edns,
        })
    }

    /// Serializes the message, uncompressed, with the OPT record last.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(512);

        let mut header = self.header;
        header.qd_count = self.questions.len() as u16;
        header.an_count = self.answers.len() as u16;
        header.ns_count = self.authority.len() as u16;
        header.ar_count = (self.additional.len() + usize::from(self.edns.is_some())) as u16;
        header.write_to(&mut buf);

        for q in &self.questions {
            q.write_to(&mut buf);
        }
        for rr in self.answers.iter().chain(&self.authority).chain(&self.additional) {
            rr.write_to(&mut buf);
        }
        if let Some(edns) = &self.edns {
            edns.write_opt(&mut buf);
        }

        buf.to_vec()
    }
}
