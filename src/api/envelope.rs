//! SOAP 1.1 RPC/encoded envelopes.
//!
//! Requests are written with quick-xml; responses are read with roxmltree.
//! Parameters are positional (`in0`, `in1`, ...), which is how the Axis JWS
//! endpoints of the application server bind arguments.

use super::constants::{SOAP_ENCODING_NS, SOAP_ENV_NS, XSD_NS, XSI_NS};
use crate::error::{Error, RemoteFailure, Result};
use crate::value::FieldValue;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

fn xsd_type(value: &FieldValue) -> &'static str {
    match value {
        FieldValue::Bool(_) => "xsd:boolean",
        FieldValue::Int(_) => "xsd:int",
        FieldValue::Float(_) => "xsd:double",
        FieldValue::Blob(_) => "xsd:hexBinary",
        _ => "xsd:string",
    }
}

fn param_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Bool(b) => b.to_string(),
        other => other.to_xml_text(),
    }
}

/// Builds the request envelope for `method` on the service at `namespace`.
pub fn build_request(namespace: &str, method: &str, params: &[FieldValue]) -> Result<String> {
    write_request(namespace, method, params)
        .map_err(|e| Error::remote(namespace, method, RemoteFailure::Malformed(e.to_string())))
}

fn write_request(
    namespace: &str,
    method: &str,
    params: &[FieldValue],
) -> std::result::Result<String, Box<dyn std::error::Error>> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut envelope = BytesStart::new("soapenv:Envelope");
    envelope.push_attribute(("xmlns:soapenv", SOAP_ENV_NS));
    envelope.push_attribute(("xmlns:xsd", XSD_NS));
    envelope.push_attribute(("xmlns:xsi", XSI_NS));
    writer.write_event(Event::Start(envelope))?;
    writer.write_event(Event::Start(BytesStart::new("soapenv:Body")))?;

    let call_tag = format!("ns1:{}", method);
    let mut call = BytesStart::new(call_tag.as_str());
    call.push_attribute(("soapenv:encodingStyle", SOAP_ENCODING_NS));
    call.push_attribute(("xmlns:ns1", namespace));
    writer.write_event(Event::Start(call))?;

    for (index, value) in params.iter().enumerate() {
        let name = format!("in{}", index);
        let mut param = BytesStart::new(name.as_str());
        if value.is_null() {
            param.push_attribute(("xsi:nil", "true"));
            writer.write_event(Event::Empty(param))?;
            continue;
        }
        param.push_attribute(("xsi:type", xsd_type(value)));
        writer.write_event(Event::Start(param))?;
        let text = param_text(value);
        writer.write_event(Event::Text(BytesText::new(&text)))?;
        writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
    }

    writer.write_event(Event::End(BytesEnd::new(call_tag.as_str())))?;
    writer.write_event(Event::End(BytesEnd::new("soapenv:Body")))?;
    writer.write_event(Event::End(BytesEnd::new("soapenv:Envelope")))?;

    Ok(String::from_utf8(writer.into_inner())?)
}

fn text_of(node: roxmltree::Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

fn is_nil(node: roxmltree::Node<'_, '_>) -> bool {
    node.attribute((XSI_NS, "nil"))
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

/// Extracts the return value of an RPC response.
///
/// `Ok(None)` means the server returned nil or nothing. A SOAP fault becomes
/// [`RemoteFailure::Fault`] with the fault string verbatim.
pub fn parse_response(body: &str, service: &str, method: &str) -> Result<Option<String>> {
    let malformed = |msg: String| Error::remote(service, method, RemoteFailure::Malformed(msg));

    let doc = roxmltree::Document::parse(body).map_err(|e| malformed(e.to_string()))?;
    let soap_body = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "Body" && n.tag_name().namespace() == Some(SOAP_ENV_NS))
        .ok_or_else(|| malformed("no SOAP body".to_string()))?;

    let first = soap_body
        .children()
        .find(|n| n.is_element())
        .ok_or_else(|| malformed("empty SOAP body".to_string()))?;

    if first.tag_name().name() == "Fault" {
        let fault = first
            .children()
            .find(|n| n.is_element() && n.tag_name().name() == "faultstring")
            .map(text_of)
            .unwrap_or_else(|| text_of(first));
        return Err(Error::remote(service, method, RemoteFailure::Fault(fault.trim().to_string())));
    }

    let Some(ret) = first.children().find(|n| n.is_element()) else {
        return Ok(None);
    };

    // Encoded responses may point at a multiRef element instead of inlining.
    let ret = match ret.attribute("href").and_then(|h| h.strip_prefix('#')) {
        Some(id) => doc
            .descendants()
            .find(|n| n.is_element() && n.attribute("id") == Some(id))
            .ok_or_else(|| malformed(format!("dangling multiRef '{}'", id)))?,
        None => ret,
    };

    if is_nil(ret) {
        return Ok(None);
    }
    Ok(Some(text_of(ret)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "http://appserver:2037/p2core/Table.jws";

    #[test]
    fn request_escapes_and_types_parameters() {
        let xml = build_request(
            NS,
            "getCompleteSQL",
            &[FieldValue::from("select * from ARTIKEL where BEZ < 'x'"), FieldValue::Int(3), FieldValue::Null],
        )
        .unwrap();

        assert!(xml.contains(r#"<ns1:getCompleteSQL soapenv:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/" xmlns:ns1="http://appserver:2037/p2core/Table.jws">"#));
        assert!(xml.contains(r#"<in0 xsi:type="xsd:string">select * from ARTIKEL where BEZ &lt; &apos;x&apos;</in0>"#)
            || xml.contains(r#"<in0 xsi:type="xsd:string">select * from ARTIKEL where BEZ &lt; 'x'</in0>"#));
        assert!(xml.contains(r#"<in1 xsi:type="xsd:int">3</in1>"#));
        assert!(xml.contains(r#"<in2 xsi:nil="true"/>"#));

        // The request must itself be well-formed.
        roxmltree::Document::parse(&xml).unwrap();
    }

    #[test]
    fn reads_inline_return_value() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
 <soapenv:Body>
  <ns1:getCompleteSQLResponse xmlns:ns1="urn:x">
   <getCompleteSQLReturn xsi:type="xsd:string">SELECT * FROM ARTIKEL WHERE MANDANT = 'M1'</getCompleteSQLReturn>
  </ns1:getCompleteSQLResponse>
 </soapenv:Body>
</soapenv:Envelope>"#;

        let value = parse_response(body, "p2core/Table", "getCompleteSQL").unwrap();
        assert_eq!(value.as_deref(), Some("SELECT * FROM ARTIKEL WHERE MANDANT = 'M1'"));
    }

    #[test]
    fn nil_and_void_returns_are_none() {
        let nil = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><soapenv:Body><r><x xsi:nil="true"/></r></soapenv:Body></soapenv:Envelope>"#;
        let void = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body><r/></soapenv:Body></soapenv:Envelope>"#;

        assert_eq!(parse_response(nil, "s", "m").unwrap(), None);
        assert_eq!(parse_response(void, "s", "m").unwrap(), None);
    }

    #[test]
    fn follows_multiref() {
        let body = r##"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body><r><ret href="#id0"/></r><multiRef id="id0">A-4711</multiRef></soapenv:Body></soapenv:Envelope>"##;
        assert_eq!(parse_response(body, "s", "m").unwrap().as_deref(), Some("A-4711"));
    }

    #[test]
    fn fault_is_surfaced_verbatim() {
        let body = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body><soapenv:Fault><faultcode>soapenv:Server.userException</faultcode><faultstring>java.lang.Exception: Artikel existiert bereits</faultstring></soapenv:Fault></soapenv:Body></soapenv:Envelope>"#;

        let err = parse_response(body, "p2core/XML", "useXML").unwrap_err();
        assert_eq!(err.fault_text(), Some("java.lang.Exception: Artikel existiert bereits"));
    }

    #[test]
    fn garbage_is_malformed() {
        let err = parse_response("<html>Bad Gateway", "s", "m").unwrap_err();
        assert!(matches!(
            err,
            Error::RemoteCall { failure: RemoteFailure::Malformed(_), .. }
        ));
    }
}
