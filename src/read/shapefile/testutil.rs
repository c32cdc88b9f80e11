//! Builds little ".shp" and ".dbf" files in memory, for tests.
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

/// A whole ".shp" file: header, then each record's content behind a record
/// header. Bounding box is (-1, -2, 3, 4).
pub fn shp(shape_type: i32, contents: &[Vec<u8>]) -> Vec<u8> {
    let body_len: usize = contents.iter().map(|c| 8 + c.len()).sum();

    let mut buf = Vec::<u8>::new();
    buf.write_i32::<BigEndian>(9994).unwrap();
    for _ in 0..5 {
        buf.write_i32::<BigEndian>(0).unwrap();
    }
    buf.write_i32::<BigEndian>(((100 + body_len) / 2) as i32).unwrap();
    buf.write_i32::<LittleEndian>(1000).unwrap();
    buf.write_i32::<LittleEndian>(shape_type).unwrap();
    for &f in &[ -1., -2., 3., 4., 0., 0., 0., 0. ] {
        buf.write_f64::<LittleEndian>(f).unwrap();
    }

    for (i, content) in contents.iter().enumerate() {
        buf.write_i32::<BigEndian>(i as i32 + 1).unwrap();
        buf.write_i32::<BigEndian>((content.len() / 2) as i32).unwrap();
        buf.extend_from_slice(content);
    }

    buf
}

fn write_points(buf: &mut Vec<u8>, points: &[(f64, f64)]) {
    for &(x, y) in points {
        buf.write_f64::<LittleEndian>(x).unwrap();
        buf.write_f64::<LittleEndian>(y).unwrap();
    }
}

pub fn null() -> Vec<u8> {
    let mut buf = Vec::<u8>::new();
    buf.write_i32::<LittleEndian>(0).unwrap();
    buf
}

pub fn point(x: f64, y: f64) -> Vec<u8> {
    let mut buf = Vec::<u8>::new();
    buf.write_i32::<LittleEndian>(1).unwrap();
    write_points(&mut buf, &[ (x, y) ]);
    buf
}

pub fn multi_point(points: &[(f64, f64)]) -> Vec<u8> {
    let mut buf = Vec::<u8>::new();
    buf.write_i32::<LittleEndian>(8).unwrap();
    buf.extend_from_slice(&[ 0u8; 32 ]);
    buf.write_i32::<LittleEndian>(points.len() as i32).unwrap();
    write_points(&mut buf, points);
    buf
}

/// PolyLine (3) or Polygon (5) content, one part per slice.
pub fn poly(shape_type: i32, parts: &[&[(f64, f64)]]) -> Vec<u8> {
    let n_points: usize = parts.iter().map(|p| p.len()).sum();

    let mut buf = Vec::<u8>::new();
    buf.write_i32::<LittleEndian>(shape_type).unwrap();
    buf.extend_from_slice(&[ 0u8; 32 ]);
    buf.write_i32::<LittleEndian>(parts.len() as i32).unwrap();
    buf.write_i32::<LittleEndian>(n_points as i32).unwrap();

    let mut offset = 0;
    for part in parts {
        buf.write_i32::<LittleEndian>(offset as i32).unwrap();
        offset += part.len();
    }
    for part in parts {
        write_points(&mut buf, part);
    }

    buf
}

/// A whole ".dbf" file. Each field is (name, type, length); each row holds
/// raw field bytes, space-padded to the field length.
pub fn dbf_bytes(fields: &[(&str, u8, u8)], rows: &[Vec<Vec<u8>>]) -> Vec<u8> {
    let header_len = 32 + 32 * fields.len() + 1;
    let record_len = 1 + fields.iter().map(|f| f.2 as usize).sum::<usize>();

    let mut buf = Vec::<u8>::new();
    buf.extend_from_slice(&[ 3, 117, 10, 19 ]);
    buf.write_u32::<LittleEndian>(rows.len() as u32).unwrap();
    buf.write_u16::<LittleEndian>(header_len as u16).unwrap();
    buf.write_u16::<LittleEndian>(record_len as u16).unwrap();
    buf.extend_from_slice(&[ 0u8; 20 ]);

    for &(name, data_type, len) in fields {
        let mut name_bytes = [ 0u8; 11 ];
        name_bytes[..name.len()].copy_from_slice(name.as_bytes());
        buf.extend_from_slice(&name_bytes);
        buf.push(data_type);
        buf.extend_from_slice(&[ 0u8; 4 ]);
        buf.push(len);
        buf.push(0);
        buf.extend_from_slice(&[ 0u8; 14 ]);
    }
    buf.push(0x0d);

    for row in rows {
        buf.push(b' ');
        for (value, &(_, _, len)) in row.iter().zip(fields.iter()) {
            let mut cell = vec![ b' '; len as usize ];
            let n = value.len().min(len as usize);
            cell[..n].copy_from_slice(&value[..n]);
            buf.extend_from_slice(&cell);
        }
    }
    buf.push(0x1a);

    buf
}

pub fn dbf(fields: &[(&str, u8, u8)], rows: &[&[&str]]) -> Vec<u8> {
    let rows: Vec<Vec<Vec<u8>>> = rows.iter()
        .map(|row| row.iter().map(|v| v.as_bytes().to_vec()).collect())
        .collect();
    dbf_bytes(fields, &rows)
}
