use std::fs;
use std::io;

/// Octet counters of the `IpExt` section of `/proc/<pid>/net/netstat`.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct IpOctets {
    pub(crate) received: Option<f64>,
    pub(crate) transmitted: Option<f64>,
}

pub(crate) fn read(pid: i32) -> io::Result<IpOctets> {
    let data = fs::read_to_string(format!("/proc/{pid}/net/netstat"))?;
    parse(&data)
}

// The file is a sequence of line pairs: a header line naming the fields of a
// section, followed by a line holding their values.
fn parse(data: &str) -> io::Result<IpOctets> {
    let mut octets = IpOctets::default();
    let mut lines = data.lines();

    while let (Some(header), Some(values)) = (lines.next(), lines.next()) {
        let names: Vec<&str> = header.split_whitespace().collect();
        let values: Vec<&str> = values.split_whitespace().collect();
        let section = names.first().copied().unwrap_or_default();
        if names.len() != values.len() {
            return Err(invalid_data(format!("mismatched field count in {section}")));
        }
        if section != "IpExt:" {
            continue;
        }

        for (name, value) in names.iter().zip(values.iter()).skip(1) {
            let field = match *name {
                "InOctets" => &mut octets.received,
                "OutOctets" => &mut octets.transmitted,
                _ => continue,
            };
            *field = Some(
                value
                    .parse::<f64>()
                    .map_err(|e| invalid_data(format!("invalid value for {name}: {e}")))?,
            );
        }
    }

    Ok(octets)
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}
