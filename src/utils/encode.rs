use htmlentity::entity::{self, EncodeType, ICodedDataTrait};

fn encode_html(input: &str) -> String {
    entity::encode_with(input.as_bytes(), &EncodeType::Hex, |c, _| {
        (
            matches!(*c, '&' | '<' | '>' | '"' | '\'' | '/' | '`' | '='),
            None,
        )
    })
    .to_string()
    .unwrap_or_else(|_| input.to_owned())
}

/// Removes HTML entities. Text that fails to decode is returned as-is.
pub fn decode_api_html(input: &str) -> String {
    entity::decode(input.as_bytes())
        .to_string()
        .unwrap_or_else(|_| input.to_owned())
}

/// Decodes, then encodes: the result is encoded exactly once whether or not
/// the server already encoded it.
pub fn encode_api_html(input: &str) -> String {
    encode_html(&decode_api_html(input))
}
