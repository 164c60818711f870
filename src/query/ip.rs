use super::{QueryKind, Validatable, impl_boostable, impl_fieldable};
use crate::error::{CompileError, ValidationError};
use crate::index::IndexReader;
use crate::mapping::{FieldType, IndexMapping};
use crate::search::{
    PlanNode, SearchContext, SearchPlan, Searchable, SearcherOptions, check_field_type,
    resolve_field,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Matches IP fields inside a CIDR block. A bare address is treated as a
/// block of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpRangeQuery {
    pub cidr: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f64>,
}

impl IpRangeQuery {
    pub fn new(cidr: impl Into<String>) -> Self {
        Self {
            cidr: cidr.into(),
            field: String::new(),
            boost: None,
        }
    }

    /// Parses the block into its network address and prefix length.
    pub fn network(&self) -> Result<(IpAddr, u8), ValidationError> {
        parse_cidr(&self.cidr).map_err(|message| ValidationError::InvalidCidr {
            cidr: self.cidr.clone(),
            message,
        })
    }
}

impl Validatable for IpRangeQuery {
    fn validate(&self) -> Result<(), ValidationError> {
        self.network().map(|_| ())
    }
}

impl Searchable for IpRangeQuery {
    fn compile(
        &self,
        _ctx: &SearchContext,
        _reader: &dyn IndexReader,
        mapping: &dyn IndexMapping,
        options: &SearcherOptions,
    ) -> Result<SearchPlan, CompileError> {
        let (network, prefix_len) = self.network()?;
        let field = resolve_field(&self.field, mapping);
        check_field_type(mapping, QueryKind::IpRange, field, FieldType::Ip)?;
        Ok(SearchPlan::new(
            PlanNode::IpRange {
                field: field.to_string(),
                network,
                prefix_len,
            },
            self.boost,
            options,
        ))
    }
}

impl_boostable!(IpRangeQuery);
impl_fieldable!(IpRangeQuery);

fn parse_cidr(text: &str) -> Result<(IpAddr, u8), String> {
    let text = text.trim();
    let (addr, prefix) = match text.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (text, None),
    };
    let addr: IpAddr = addr
        .parse()
        .map_err(|e: std::net::AddrParseError| e.to_string())?;

    let max_len = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    let prefix_len = match prefix {
        Some(p) => p
            .parse::<u8>()
            .map_err(|_| format!("invalid prefix length '{}'", p))?,
        None => max_len,
    };
    if prefix_len > max_len {
        return Err(format!(
            "prefix length {} exceeds {} bits",
            prefix_len, max_len
        ));
    }

    Ok((mask(addr, prefix_len), prefix_len))
}

/// Clears the host bits of `addr`.
fn mask(addr: IpAddr, prefix_len: u8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let mask = u32::MAX.checked_shl(32 - prefix_len as u32).unwrap_or(0);
            IpAddr::V4(Ipv4Addr::from(bits & mask))
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let mask = u128::MAX.checked_shl(128 - prefix_len as u32).unwrap_or(0);
            IpAddr::V6(Ipv6Addr::from(bits & mask))
        }
    }
}
